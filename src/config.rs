use crate::acquisition::{scaling::ScalingConfig, AcquisitionConfig};
use crate::converter::SampleTime;

/// External ADC reference, V
pub const ADC_VREF_EXT: f32 = 2.5;

/// Battery voltage tap divider ratio
pub const ADC_VBAT_VOLTAGE_DIVIDER: f32 = 4.0;

/// 12 bit converter full-scale code
pub const ADC_FULL_RANGE: f32 = 4095.0;

/// Temperature sensor output at 25 degC, mV
pub const ADC_V25_MV: f32 = 760.0;

/// Temperature sensor average slope, V/degC
pub const ADC_AVG_SLOPE: f32 = 0.0025;

//-----------------------------------------------------------------------------

/// Sampling time reasserted before every conversion
pub const ADC_SAMPLE_TIME: SampleTime = SampleTime::Cycles1_5;

/// Rank of the only regular conversion
pub const ADC_RANK: u8 = 1;

/// Число вызовов ctrl() в ожидании прерывания, после которого преобразование
/// считается потерянным и перезапускается. 0 - не перезапускать.
pub const ADC_TIMEOUT_CYCLES: u16 = 10;

/// Период вызова ctrl(), мс
pub const ADC_CTRL_PERIOD_MS: u32 = 10;

//-----------------------------------------------------------------------------

/// Diagnostic events kept in RAM
pub const DIAG_LOG_SIZE: usize = 8;

//-----------------------------------------------------------------------------

pub const SCALING: ScalingConfig = ScalingConfig {
    v_ref: ADC_VREF_EXT,
    vbat_divider: ADC_VBAT_VOLTAGE_DIVIDER,
    full_scale: ADC_FULL_RANGE,
    v25_mv: ADC_V25_MV,
    avg_slope: ADC_AVG_SLOPE,
};

pub const ACQUISITION: AcquisitionConfig = AcquisitionConfig {
    scaling: SCALING,
    sample_time: ADC_SAMPLE_TIME,
    timeout_cycles: ADC_TIMEOUT_CYCLES,
};
