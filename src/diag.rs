use heapless::Deque;

use crate::acquisition::ChannelSelector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagEvent {
    /// Conversion-complete interrupt did not arrive in time, the conversion
    /// was restarted.
    AcquisitionTimeout {
        channel: ChannelSelector,
        waited_cycles: u16,
    },
}

pub trait Diagnostics {
    fn report(&mut self, event: DiagEvent);
}

impl Diagnostics for () {
    fn report(&mut self, _event: DiagEvent) {}
}

/// Последние `N` событий, старые вытесняются.
pub struct DiagLog<const N: usize> {
    events: Deque<DiagEvent, N>,
    dropped: u32,
}

impl<const N: usize> DiagLog<N> {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &DiagEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// events pushed out of the log
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<const N: usize> Default for DiagLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Diagnostics for DiagLog<N> {
    fn report(&mut self, event: DiagEvent) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        // место есть
        let _ = self.events.push_back(event);
    }
}
