use core::cell::Cell;

use critical_section::Mutex;

/// Identifiers of the data blocks in the shared store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBlockId {
    Adc,
}

pub trait DataBlock: Copy {
    const ID: DataBlockId;
}

/// Приемник опубликованных блоков. Публикация не может завершиться ошибкой.
pub trait DataStore<B: DataBlock> {
    fn store(&mut self, block: &B);
}

#[derive(Clone, Copy)]
struct Slot<B> {
    generation: u32,
    block: Option<B>,
}

/// Last published copy of a block, readable from any context. Can be a
/// `static`.
pub struct LatestBlock<B> {
    slot: Mutex<Cell<Slot<B>>>,
}

impl<B: DataBlock> LatestBlock<B> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(Slot {
                generation: 0,
                block: None,
            })),
        }
    }

    pub fn publish(&self, block: &B) {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let slot = cell.get();
            cell.set(Slot {
                generation: slot.generation.wrapping_add(1),
                block: Some(*block),
            });
        });
    }

    /// `None` until the first publish
    pub fn read(&self) -> Option<B> {
        critical_section::with(|cs| self.slot.borrow(cs).get().block)
    }

    /// Number of publishes so far, wraps
    pub fn generation(&self) -> u32 {
        critical_section::with(|cs| self.slot.borrow(cs).get().generation)
    }
}

impl<B: DataBlock> Default for LatestBlock<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: DataBlock> DataStore<B> for &LatestBlock<B> {
    fn store(&mut self, block: &B) {
        self.publish(block)
    }
}

impl<B: DataBlock> DataStore<B> for LatestBlock<B> {
    fn store(&mut self, block: &B) {
        self.publish(block)
    }
}
