#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_abort as _;

use bms_adc::{acquisition::MeasurementRecord, database::LatestBlock};

/// Последний опубликованный блок АЦП, читают потребители
pub static ADC_BLOCK: LatestBlock<MeasurementRecord> = LatestBlock::new();

#[rtic::app(device = stm32f1xx_hal::pac, dispatchers = [EXTI0])]
mod app {
    use bms_adc::{
        acquisition::{Acquisition, CompletionHandler, Controller},
        config,
        converter::{self, Adc1, ApbClocks},
        diag::DiagLog,
    };
    use stm32f1xx_hal::{
        gpio::{Analog, PA1},
        prelude::*,
    };
    use systick_monotonic::{fugit::ExtU64, Systick};

    #[monotonic(binds = SysTick, default = true)]
    type Mono = Systick<1000>;

    #[shared]
    struct Shared {
        adc: Adc1<PA1<Analog>>,
    }

    #[local]
    struct Local {
        ctrl: Controller<'static>,
        isr: CompletionHandler<'static>,
        diag: DiagLog<{ config::DIAG_LOG_SIZE }>,
    }

    #[init(local = [acq: Acquisition = Acquisition::new(config::ACQUISITION)])]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::trace!("++ Start up! ++");

        let mut flash = cx.device.FLASH.constrain();
        let rcc = cx.device.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(72.MHz())
            .pclk1(36.MHz())
            .adcclk(12.MHz())
            .freeze(&mut flash.acr);

        let mut gpioa = cx.device.GPIOA.split();
        let vbat_pin = gpioa.pa1.into_analog(&mut gpioa.crl);

        let mut adc = Adc1::new(cx.device.ADC1, vbat_pin);
        converter::init(Some(core::slice::from_mut(&mut adc)), &mut ApbClocks);

        let mono = Systick::new(cx.core.SYST, clocks.sysclk().to_Hz());

        let (ctrl, isr) = cx.local.acq.split();

        adc_ctrl::spawn().ok();

        defmt::info!("ADC acquisition started");

        (
            Shared { adc },
            Local {
                ctrl,
                isr,
                diag: DiagLog::new(),
            },
            init::Monotonics(mono),
        )
    }

    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    // config::ADC_CTRL_PERIOD_MS
    #[task(shared = [adc], local = [ctrl, diag], priority = 1)]
    fn adc_ctrl(mut cx: adc_ctrl::Context) {
        let ctrl = cx.local.ctrl;
        let diag = cx.local.diag;

        cx.shared
            .adc
            .lock(|adc| ctrl.ctrl(adc, &mut &crate::ADC_BLOCK, diag));

        adc_ctrl::spawn_after((config::ADC_CTRL_PERIOD_MS as u64).millis()).ok();
    }

    // приоритет выше чем у adc_ctrl: прерывание вытесняет ctrl
    #[task(binds = ADC1_2, shared = [adc], local = [isr], priority = 2)]
    fn adc_complete(mut cx: adc_complete::Context) {
        let isr = cx.local.isr;
        let clock = || monotonics::now().ticks() as u32;

        let result = cx
            .shared
            .adc
            .lock(|adc| isr.on_conversion_complete(adc, &clock));

        match result {
            Ok(sample) => defmt::trace!("ADC sample: {}", sample),
            Err(e) => defmt::warn!("ADC: {}", e),
        }
    }
}
