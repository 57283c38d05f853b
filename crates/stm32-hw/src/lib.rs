//! Hardware constants for the STM32F1 family as seen by the emulator.
//!
//! # References
//! - RM0008: STM32F101xx/F102xx/F103xx/F105xx/F107xx reference manual
//! - DS5319: STM32F103x8/xB datasheet

pub mod memory_map;
pub mod mmio;
pub mod specs;
