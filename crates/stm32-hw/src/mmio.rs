//! Peripheral register layouts.

pub mod pwr;
