use crate::database::{DataBlock, DataBlockId};

/// Last result of one signal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalRecord {
    pub value: f32,
    pub previous_timestamp: u32,
    pub timestamp: u32,
    /// completed conversions, wraps
    pub counter: u32,
}

impl SignalRecord {
    pub const fn new() -> Self {
        Self {
            value: 0.0,
            previous_timestamp: 0,
            timestamp: 0,
            counter: 0,
        }
    }

    /// Старая метка уходит в previous_timestamp, только потом пишется новая.
    pub(crate) fn update(&mut self, value: f32, now: u32) {
        self.value = value;
        self.previous_timestamp = self.timestamp;
        self.timestamp = now;
        self.counter = self.counter.wrapping_add(1);
    }
}

/// ADC data block: battery voltage (V) and CPU temperature (degC).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementRecord {
    pub vbat: SignalRecord,
    pub temperature: SignalRecord,
}

impl MeasurementRecord {
    pub const fn new() -> Self {
        Self {
            vbat: SignalRecord::new(),
            temperature: SignalRecord::new(),
        }
    }
}

impl DataBlock for MeasurementRecord {
    const ID: DataBlockId = DataBlockId::Adc;
}
