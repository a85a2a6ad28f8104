#[macro_use]
mod fmt;

pub mod timestamp;
