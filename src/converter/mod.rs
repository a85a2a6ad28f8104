use crate::acquisition::ChannelSelector;

#[cfg(feature = "stm32f103")]
mod adc_f103;

#[cfg(feature = "stm32f103")]
pub use adc_f103::{Adc1, ApbClocks};

/// Converter instances that may be present on the chip, one clock domain each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConverterInstance {
    Adc1,
    Adc2,
    Adc3,
}

/// Sampling time in ADC clock cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SampleTime {
    Cycles1_5 = 0b000,
    Cycles7_5 = 0b001,
    Cycles13_5 = 0b010,
    Cycles28_5 = 0b011,
    Cycles41_5 = 0b100,
    Cycles55_5 = 0b101,
    Cycles71_5 = 0b110,
    Cycles239_5 = 0b111,
}

impl SampleTime {
    /// SMPx field value
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Channel programming for one regular conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub channel: ChannelSelector,
    pub rank: u8,
    pub sample_time: SampleTime,
    pub offset: u16,
}

/// Clock gating of the converter instances (RCC).
pub trait ClockDomains {
    fn is_enabled(&self, instance: ConverterInstance) -> bool;
    fn enable(&mut self, instance: ConverterInstance);
}

/// One converter device. All calls are synchronous and can not fail at this
/// level, hardware faults are handled below.
pub trait Converter {
    fn instance(&self) -> ConverterInstance;

    /// power-up, calibration, single conversion mode
    fn init(&mut self);

    /// Select `cfg.channel` as the only regular conversion
    fn configure_channel(&mut self, cfg: &ChannelConfig);

    /// Enable end-of-conversion interrupt and start conversion
    fn start_it(&mut self);

    /// Disable end-of-conversion interrupt, acknowledge it and stop
    fn stop_it(&mut self);

    /// Last converted raw code
    fn value(&mut self) -> u16;
}

/// Enables clocks of every listed converter (once per domain) and initializes
/// it. `None` or an empty list does nothing.
pub fn init<C, R>(devices: Option<&mut [C]>, clocks: &mut R)
where
    C: Converter,
    R: ClockDomains,
{
    let devices = match devices {
        Some(devices) => devices,
        None => return,
    };

    for dev in devices.iter_mut() {
        let instance = dev.instance();
        if !clocks.is_enabled(instance) {
            clocks.enable(instance);
            debug!("ADC clock enabled: {:?}", instance);
        }
        dev.init();
    }
}
