#![cfg_attr(not(test), no_std)]

//! Battery voltage / CPU temperature acquisition over one shared ADC channel.
//!
//! The converter is driven by two entry points: [`acquisition::Controller::ctrl`]
//! called from a periodic task and
//! [`acquisition::CompletionHandler::on_conversion_complete`] called from the
//! conversion-complete interrupt. Results are published to a
//! [`database::DataStore`] as [`acquisition::MeasurementRecord`].

// must be first, macros are textually scoped
#[macro_use]
mod support;

pub mod acquisition;
pub mod config;
pub mod converter;
pub mod database;
pub mod diag;

pub use support::timestamp::TimeStamp;
