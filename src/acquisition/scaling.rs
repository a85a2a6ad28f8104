/// Transfer function constants of the two signals.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScalingConfig {
    /// reference voltage, V
    pub v_ref: f32,
    pub vbat_divider: f32,
    /// code at full scale
    pub full_scale: f32,
    /// sensor output at 25 degC, mV
    pub v25_mv: f32,
    /// sensor slope, V/degC
    pub avg_slope: f32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        crate::config::SCALING
    }
}

/// Battery voltage at the tap, V
pub fn scale_vbat(raw: u16, cfg: &ScalingConfig) -> f32 {
    (raw as f32) * cfg.v_ref * cfg.vbat_divider / cfg.full_scale
}

/// Temperature sensor output, mV
pub fn scale_temperature_mv(raw: u16, cfg: &ScalingConfig) -> f32 {
    (raw as f32) * (1000.0 * cfg.v_ref) / cfg.full_scale
}

pub fn mv_to_degrees(mv: f32, cfg: &ScalingConfig) -> f32 {
    (mv - cfg.v25_mv) / (1000.0 * cfg.avg_slope) + 25.0
}
