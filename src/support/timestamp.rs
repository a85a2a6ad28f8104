/// Источник меток времени для результатов измерений (тики, обычно мс).
pub trait TimeStamp {
    fn timestamp(&self) -> u32;
}

impl<F: Fn() -> u32> TimeStamp for F {
    fn timestamp(&self) -> u32 {
        self()
    }
}
