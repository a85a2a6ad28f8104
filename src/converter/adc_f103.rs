use embedded_hal::adc::Channel;
use stm32f1xx_hal::pac::{self, ADC1};

use crate::acquisition::ChannelSelector;

use super::{ChannelConfig, ClockDomains, Converter, ConverterInstance};

/// Internal temperature sensor input
const TEMPSENSOR_CHANNEL: u8 = 16;

// RCC_APB2ENR
const ADC1EN: u32 = 1 << 9;
const ADC2EN: u32 = 1 << 10;
const ADC3EN: u32 = 1 << 15;

/// ADC clock gates in RCC_APB2ENR.
pub struct ApbClocks;

impl ApbClocks {
    fn mask(instance: ConverterInstance) -> u32 {
        match instance {
            ConverterInstance::Adc1 => ADC1EN,
            ConverterInstance::Adc2 => ADC2EN,
            ConverterInstance::Adc3 => ADC3EN,
        }
    }
}

impl ClockDomains for ApbClocks {
    fn is_enabled(&self, instance: ConverterInstance) -> bool {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.read().bits() & Self::mask(instance) != 0
    }

    fn enable(&mut self, instance: ConverterInstance) {
        let rcc = unsafe { &*pac::RCC::ptr() };
        let mask = Self::mask(instance);
        rcc.apb2enr
            .modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    }
}

/// ADC1, battery voltage tap on `VBATPIN`, temperature on the internal sensor.
pub struct Adc1<VBATPIN> {
    adc: ADC1,
    _vbat_pin: VBATPIN,
}

impl<VBATPIN> Adc1<VBATPIN>
where
    VBATPIN: Channel<ADC1, ID = u8>,
{
    // пин не используется, но нужен для выведения номера канала и поглащается
    pub fn new(adc: ADC1, vbat_pin: VBATPIN) -> Self {
        Self {
            adc,
            _vbat_pin: vbat_pin,
        }
    }

    fn hw_channel(channel: ChannelSelector) -> u8 {
        match channel {
            ChannelSelector::VoltageTap => VBATPIN::channel(),
            ChannelSelector::TemperatureSensor => TEMPSENSOR_CHANNEL,
        }
    }

    fn set_sample_time(&mut self, ch: u8, smp: u8) {
        if ch < 10 {
            let shift = 3 * ch as u32;
            self.adc.smpr2.modify(|r, w| unsafe {
                w.bits((r.bits() & !(0b111 << shift)) | ((smp as u32) << shift))
            });
        } else {
            let shift = 3 * (ch as u32 - 10);
            self.adc.smpr1.modify(|r, w| unsafe {
                w.bits((r.bits() & !(0b111 << shift)) | ((smp as u32) << shift))
            });
        }
    }
}

impl<VBATPIN> Converter for Adc1<VBATPIN>
where
    VBATPIN: Channel<ADC1, ID = u8>,
{
    fn instance(&self) -> ConverterInstance {
        ConverterInstance::Adc1
    }

    fn init(&mut self) {
        // power up, tSTAB 1 us
        self.adc.cr2.modify(|_, w| w.adon().set_bit());
        cortex_m::asm::delay(100);

        self.adc.cr2.modify(|_, w| w.rstcal().set_bit());
        while self.adc.cr2.read().rstcal().bit_is_set() {}

        self.adc.cr2.modify(|_, w| w.cal().set_bit());
        while self.adc.cr2.read().cal().bit_is_set() {}

        // single conversion, SWSTART trigger, right aligned, temperature sensor on
        self.adc.cr1.modify(|_, w| w.scan().clear_bit().eocie().clear_bit());
        self.adc.cr2.modify(|_, w| unsafe {
            w.cont()
                .clear_bit()
                .align()
                .clear_bit()
                .exttrig()
                .set_bit()
                .extsel()
                .bits(0b111)
                .tsvrefe()
                .set_bit()
        });

        trace!("ADC1 calibrated");
    }

    fn configure_channel(&mut self, cfg: &ChannelConfig) {
        let ch = Self::hw_channel(cfg.channel);

        self.set_sample_time(ch, cfg.sample_time.bits());

        // одно преобразование в регулярной последовательности, поддерживается
        // только rank 1. Смещение у регулярных каналов F1 не настраивается.
        debug_assert_eq!(cfg.rank, 1);
        self.adc.sqr1.modify(|_, w| unsafe { w.l().bits(0) });
        self.adc.sqr3.write(|w| unsafe { w.sq1().bits(ch) });
    }

    fn start_it(&mut self) {
        self.adc.sr.modify(|_, w| w.eoc().clear_bit());
        self.adc.cr1.modify(|_, w| w.eocie().set_bit());
        self.adc.cr2.modify(|_, w| w.swstart().set_bit());
    }

    fn stop_it(&mut self) {
        self.adc.cr1.modify(|_, w| w.eocie().clear_bit());
        self.adc.sr.modify(|_, w| w.eoc().clear_bit());
    }

    fn value(&mut self) -> u16 {
        self.adc.dr.read().data().bits()
    }
}
