//! Чередующееся измерение напряжения батареи и температуры CPU на одном канале
//! АЦП.
//!
//! Цикл: `IssueConversion` -> `AwaitCompletion` -> `PublishResult` -> ...
//!
//! [`Controller::ctrl`] вызывается периодически (10 мс), запускает
//! преобразование и публикует результат. [`CompletionHandler::on_conversion_complete`]
//! вызывается из прерывания "преобразование завершено", масштабирует результат
//! и переводит автомат в `PublishResult`.
//!
//! Владение разделено через [`Acquisition::split`]: только контроллер пишет
//! выбор канала, только обработчик прерывания пишет запись измерений.
//! Общее для обоих контекстов - атомарные теги состояния и канала и
//! запись под `critical_section::Mutex`.

use core::cell::Cell;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;

use crate::converter::{ChannelConfig, Converter, SampleTime};
use crate::database::DataStore;
use crate::diag::{DiagEvent, Diagnostics};
use crate::support::timestamp::TimeStamp;

pub mod record;
pub mod scaling;

pub use record::{MeasurementRecord, SignalRecord};
use scaling::ScalingConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelSelector {
    VoltageTap = 0,
    TemperatureSensor = 1,
}

impl ChannelSelector {
    pub const fn next(self) -> Self {
        match self {
            ChannelSelector::VoltageTap => ChannelSelector::TemperatureSensor,
            ChannelSelector::TemperatureSensor => ChannelSelector::VoltageTap,
        }
    }

    const fn from_bits(v: u8) -> Self {
        match v {
            0 => ChannelSelector::VoltageTap,
            _ => ChannelSelector::TemperatureSensor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConversionState {
    IssueConversion = 0,
    AwaitCompletion = 1,
    PublishResult = 2,
}

impl ConversionState {
    const fn from_bits(v: u8) -> Self {
        // пишутся только значения 0..=2
        match v {
            0 => ConversionState::IssueConversion,
            1 => ConversionState::AwaitCompletion,
            _ => ConversionState::PublishResult,
        }
    }
}

struct AtomicState(AtomicU8);

impl AtomicState {
    const fn new(state: ConversionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> ConversionState {
        ConversionState::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: ConversionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transit(&self, from: ConversionState, to: ConversionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    pub scaling: ScalingConfig,
    pub sample_time: SampleTime,
    /// ctrl() calls spent waiting before the conversion is restarted, 0 - never
    pub timeout_cycles: u16,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        crate::config::ACQUISITION
    }
}

/// Result of one completed conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub channel: ChannelSelector,
    pub raw: u16,
    pub value: f32,
    pub timestamp: u32,
}

/// What a ctrl() call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlAction {
    Issued(ChannelSelector),
    Waiting,
    /// conversion lost, restarted on the same channel
    Reissued(ChannelSelector),
    Published,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionError {
    /// Completion interrupt without an outstanding conversion, ignored.
    StrayCompletion { state: ConversionState },
}

struct Shared {
    state: AtomicState,
    channel: AtomicU8,
    record: Mutex<Cell<MeasurementRecord>>,
    scaling: ScalingConfig,
}

impl Shared {
    fn snapshot(&self) -> MeasurementRecord {
        critical_section::with(|cs| self.record.borrow(cs).get())
    }
}

struct ControlState {
    next_channel: ChannelSelector,
    channel_cfg: ChannelConfig,
    sample_time: SampleTime,
    timeout_cycles: u16,
    waiting: u16,
}

/// Acquisition state. Lives for the whole program, split once into the
/// control and interrupt halves.
pub struct Acquisition {
    shared: Shared,
    control: ControlState,
}

impl Acquisition {
    pub const fn new(config: AcquisitionConfig) -> Self {
        Self {
            shared: Shared {
                state: AtomicState::new(ConversionState::IssueConversion),
                channel: AtomicU8::new(ChannelSelector::VoltageTap as u8),
                record: Mutex::new(Cell::new(MeasurementRecord::new())),
                scaling: config.scaling,
            },
            control: ControlState {
                next_channel: ChannelSelector::VoltageTap,
                channel_cfg: ChannelConfig {
                    channel: ChannelSelector::VoltageTap,
                    rank: crate::config::ADC_RANK,
                    sample_time: config.sample_time,
                    offset: 0,
                },
                sample_time: config.sample_time,
                timeout_cycles: config.timeout_cycles,
                waiting: 0,
            },
        }
    }

    pub fn state(&self) -> ConversionState {
        self.shared.state.load()
    }

    pub fn record(&self) -> MeasurementRecord {
        self.shared.snapshot()
    }

    pub fn split(&mut self) -> (Controller<'_>, CompletionHandler<'_>) {
        let Acquisition { shared, control } = self;
        let shared = &*shared;
        (Controller { shared, control }, CompletionHandler { shared })
    }
}

/// Control half, call [`Controller::ctrl`] from the periodic task.
pub struct Controller<'a> {
    shared: &'a Shared,
    control: &'a mut ControlState,
}

impl<'a> Controller<'a> {
    pub fn ctrl<C, S, D>(&mut self, adc: &mut C, store: &mut S, diag: &mut D) -> ControlAction
    where
        C: Converter,
        S: DataStore<MeasurementRecord>,
        D: Diagnostics,
    {
        // could have been changed by someone else sharing the converter
        self.control.channel_cfg.rank = crate::config::ADC_RANK;
        self.control.channel_cfg.sample_time = self.control.sample_time;
        self.control.channel_cfg.offset = 0;

        match self.shared.state.load() {
            ConversionState::IssueConversion => {
                let channel = self.control.next_channel;
                self.control.next_channel = channel.next();
                self.issue(adc, channel);
                ControlAction::Issued(channel)
            }
            ConversionState::AwaitCompletion => self.check_timeout(adc, diag),
            ConversionState::PublishResult => {
                let record = self.shared.snapshot();
                store.store(&record);
                self.shared.state.store(ConversionState::IssueConversion);
                trace!(
                    "ADC published: vbat={} t={}",
                    record.vbat.value,
                    record.temperature.value
                );
                ControlAction::Published
            }
        }
    }

    fn check_timeout<C, D>(&mut self, adc: &mut C, diag: &mut D) -> ControlAction
    where
        C: Converter,
        D: Diagnostics,
    {
        if self.control.timeout_cycles == 0 {
            return ControlAction::Waiting;
        }

        self.control.waiting = self.control.waiting.saturating_add(1);
        if self.control.waiting < self.control.timeout_cycles {
            return ControlAction::Waiting;
        }

        // прерывание могло успеть
        if !self.shared.state.transit(
            ConversionState::AwaitCompletion,
            ConversionState::IssueConversion,
        ) {
            return ControlAction::Waiting;
        }

        adc.stop_it();

        let channel = self.control.channel_cfg.channel;
        let waited_cycles = self.control.waiting;
        warn!(
            "ADC conversion timeout: {:?} after {} cycles",
            channel,
            waited_cycles
        );
        diag.report(DiagEvent::AcquisitionTimeout {
            channel,
            waited_cycles,
        });

        self.issue(adc, channel);
        ControlAction::Reissued(channel)
    }

    fn issue<C: Converter>(&mut self, adc: &mut C, channel: ChannelSelector) {
        self.control.channel_cfg.channel = channel;
        self.control.waiting = 0;

        self.shared.channel.store(channel as u8, Ordering::Relaxed);
        adc.configure_channel(&self.control.channel_cfg);

        // до старта: прерывание может прийти сразу
        self.shared.state.store(ConversionState::AwaitCompletion);
        adc.start_it();
    }

    pub fn state(&self) -> ConversionState {
        self.shared.state.load()
    }

    /// Channel the next fresh conversion will target
    pub fn next_channel(&self) -> ChannelSelector {
        self.control.next_channel
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.control.channel_cfg
    }

    pub fn record(&self) -> MeasurementRecord {
        self.shared.snapshot()
    }
}

/// Interrupt half, call [`CompletionHandler::on_conversion_complete`] from the
/// ADC end-of-conversion interrupt.
pub struct CompletionHandler<'a> {
    shared: &'a Shared,
}

impl<'a> CompletionHandler<'a> {
    pub fn on_conversion_complete<C, T>(
        &mut self,
        adc: &mut C,
        clock: &T,
    ) -> Result<Sample, AcquisitionError>
    where
        C: Converter,
        T: TimeStamp,
    {
        let shared = self.shared;

        critical_section::with(|cs| {
            adc.stop_it();

            let state = shared.state.load();
            if state != ConversionState::AwaitCompletion {
                return Err(AcquisitionError::StrayCompletion { state });
            }

            let raw = adc.value();
            let channel = ChannelSelector::from_bits(shared.channel.load(Ordering::Relaxed));
            let value = match channel {
                ChannelSelector::VoltageTap => scaling::scale_vbat(raw, &shared.scaling),
                ChannelSelector::TemperatureSensor => scaling::mv_to_degrees(
                    scaling::scale_temperature_mv(raw, &shared.scaling),
                    &shared.scaling,
                ),
            };
            let timestamp = clock.timestamp();

            let cell = shared.record.borrow(cs);
            let mut record = cell.get();
            match channel {
                ChannelSelector::VoltageTap => record.vbat.update(value, timestamp),
                ChannelSelector::TemperatureSensor => record.temperature.update(value, timestamp),
            }
            cell.set(record);

            shared.state.store(ConversionState::PublishResult);

            Ok(Sample {
                channel,
                raw,
                value,
                timestamp,
            })
        })
    }

    pub fn state(&self) -> ConversionState {
        self.shared.state.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterInstance;
    use crate::diag::DiagLog;

    #[derive(Default)]
    struct FakeAdc {
        configured: Option<ChannelConfig>,
        starts: usize,
        stops: usize,
        raw: u16,
    }

    impl Converter for FakeAdc {
        fn instance(&self) -> ConverterInstance {
            ConverterInstance::Adc1
        }
        fn init(&mut self) {}
        fn configure_channel(&mut self, cfg: &ChannelConfig) {
            self.configured = Some(*cfg);
        }
        fn start_it(&mut self) {
            self.starts += 1;
        }
        fn stop_it(&mut self) {
            self.stops += 1;
        }
        fn value(&mut self) -> u16 {
            self.raw
        }
    }

    #[derive(Default)]
    struct Store {
        published: usize,
        last: Option<MeasurementRecord>,
    }

    impl DataStore<MeasurementRecord> for Store {
        fn store(&mut self, block: &MeasurementRecord) {
            self.published += 1;
            self.last = Some(*block);
        }
    }

    fn config(timeout_cycles: u16) -> AcquisitionConfig {
        AcquisitionConfig {
            timeout_cycles,
            ..AcquisitionConfig::default()
        }
    }

    #[test]
    fn starts_in_issue_state() {
        let acq = Acquisition::new(config(0));
        assert_eq!(acq.state(), ConversionState::IssueConversion);
        assert_eq!(acq.record(), MeasurementRecord::default());
    }

    #[test]
    fn channels_alternate_starting_from_vbat() {
        let mut acq = Acquisition::new(config(0));
        let (mut ctrl, mut isr) = acq.split();
        let (mut adc, mut store, mut diag) = (FakeAdc::default(), Store::default(), ());
        let clock = || 0u32;

        let mut issued = [ChannelSelector::VoltageTap; 6];
        for slot in issued.iter_mut() {
            match ctrl.ctrl(&mut adc, &mut store, &mut diag) {
                ControlAction::Issued(ch) => *slot = ch,
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(adc.configured.map(|c| c.channel), Some(*slot));
            isr.on_conversion_complete(&mut adc, &clock).unwrap();
            assert_eq!(
                ctrl.ctrl(&mut adc, &mut store, &mut diag),
                ControlAction::Published
            );
        }

        use ChannelSelector::*;
        assert_eq!(
            issued,
            [
                VoltageTap,
                TemperatureSensor,
                VoltageTap,
                TemperatureSensor,
                VoltageTap,
                TemperatureSensor
            ]
        );
        assert_eq!(store.published, 6);
    }

    #[test]
    fn channel_config_reasserted() {
        let mut acq = Acquisition::new(config(0));
        let (mut ctrl, _) = acq.split();
        let mut adc = FakeAdc::default();

        ctrl.ctrl(&mut adc, &mut Store::default(), &mut ());

        let cfg = adc.configured.unwrap();
        assert_eq!(cfg.rank, 1);
        assert_eq!(cfg.offset, 0);
        assert_eq!(cfg.sample_time, crate::config::ADC_SAMPLE_TIME);
    }

    #[test]
    fn waiting_does_not_start_or_toggle() {
        let mut acq = Acquisition::new(config(0));
        let (mut ctrl, _) = acq.split();
        let (mut adc, mut store) = (FakeAdc::default(), Store::default());

        ctrl.ctrl(&mut adc, &mut store, &mut ());
        let next = ctrl.next_channel();

        for _ in 0..100 {
            assert_eq!(
                ctrl.ctrl(&mut adc, &mut store, &mut ()),
                ControlAction::Waiting
            );
        }

        assert_eq!(adc.starts, 1);
        assert_eq!(ctrl.next_channel(), next);
        assert_eq!(ctrl.state(), ConversionState::AwaitCompletion);
        assert_eq!(store.published, 0);
    }

    #[test]
    fn stray_completion_ignored() {
        let mut acq = Acquisition::new(config(0));
        let (mut ctrl, mut isr) = acq.split();
        let (mut adc, mut store) = (FakeAdc::default(), Store::default());

        assert_eq!(
            isr.on_conversion_complete(&mut adc, &|| 1u32),
            Err(AcquisitionError::StrayCompletion {
                state: ConversionState::IssueConversion
            })
        );

        ctrl.ctrl(&mut adc, &mut store, &mut ());
        adc.raw = 100;
        isr.on_conversion_complete(&mut adc, &|| 10u32).unwrap();
        let after_first = ctrl.record();

        assert_eq!(
            isr.on_conversion_complete(&mut adc, &|| 20u32),
            Err(AcquisitionError::StrayCompletion {
                state: ConversionState::PublishResult
            })
        );
        assert_eq!(ctrl.record(), after_first);
        assert_eq!(after_first.vbat.timestamp, 10);
        assert_eq!(after_first.vbat.counter, 1);

        ctrl.ctrl(&mut adc, &mut store, &mut ());
        assert_eq!(store.published, 1);
        // interrupt source acknowledged every time
        assert_eq!(adc.stops, 3);
    }

    #[test]
    fn timeout_reissues_same_channel() {
        let mut acq = Acquisition::new(config(3));
        let (mut ctrl, mut isr) = acq.split();
        let (mut adc, mut store) = (FakeAdc::default(), Store::default());
        let mut diag = DiagLog::<4>::new();

        assert_eq!(
            ctrl.ctrl(&mut adc, &mut store, &mut diag),
            ControlAction::Issued(ChannelSelector::VoltageTap)
        );
        assert_eq!(
            ctrl.ctrl(&mut adc, &mut store, &mut diag),
            ControlAction::Waiting
        );
        assert_eq!(
            ctrl.ctrl(&mut adc, &mut store, &mut diag),
            ControlAction::Waiting
        );
        assert_eq!(
            ctrl.ctrl(&mut adc, &mut store, &mut diag),
            ControlAction::Reissued(ChannelSelector::VoltageTap)
        );

        assert_eq!(adc.starts, 2);
        assert_eq!(adc.stops, 1);
        assert_eq!(ctrl.state(), ConversionState::AwaitCompletion);
        assert_eq!(ctrl.next_channel(), ChannelSelector::TemperatureSensor);
        assert_eq!(
            diag.iter().copied().collect::<Vec<_>>(),
            vec![DiagEvent::AcquisitionTimeout {
                channel: ChannelSelector::VoltageTap,
                waited_cycles: 3
            }]
        );

        // the restarted conversion completes normally
        isr.on_conversion_complete(&mut adc, &|| 5u32).unwrap();
        assert_eq!(
            ctrl.ctrl(&mut adc, &mut store, &mut diag),
            ControlAction::Published
        );
        assert_eq!(store.last.unwrap().vbat.counter, 1);
    }

    #[test]
    fn temperature_path_scaled() {
        let mut acq = Acquisition::new(AcquisitionConfig {
            scaling: ScalingConfig {
                v_ref: 3.3,
                vbat_divider: 2.0,
                full_scale: 4095.0,
                v25_mv: 760.0,
                avg_slope: 0.0025,
            },
            ..config(0)
        });
        let (mut ctrl, mut isr) = acq.split();
        let (mut adc, mut store) = (FakeAdc::default(), Store::default());

        // vbat
        ctrl.ctrl(&mut adc, &mut store, &mut ());
        isr.on_conversion_complete(&mut adc, &|| 1u32).unwrap();
        ctrl.ctrl(&mut adc, &mut store, &mut ());

        // temperature
        ctrl.ctrl(&mut adc, &mut store, &mut ());
        adc.raw = 1000;
        let sample = isr.on_conversion_complete(&mut adc, &|| 2u32).unwrap();

        let mv = 1000.0 * 1000.0 * 3.3 / 4095.0;
        let expected = (mv - 760.0) / 2.5 + 25.0;
        assert_eq!(sample.channel, ChannelSelector::TemperatureSensor);
        assert!((sample.value - expected).abs() < 1e-3);
        assert_eq!(ctrl.record().temperature.counter, 1);
        assert_eq!(ctrl.record().vbat.counter, 1);
    }
}
