//! # References
//! - RM0008 section 3.3, "Memory map"
//! - DS5319 figure 11, "Memory map"

/// Main flash memory, where firmware images are loaded
///
/// Reference: RM0008 section 3.3.3
pub mod flash {
    /// Flash base address
    pub const BASE: u32 = 0x0800_0000;
    /// Flash size (128 KB, medium-density devices)
    pub const SIZE: usize = 128 * 1024;
}

/// Embedded SRAM
///
/// Reference: RM0008 section 3.3.1
pub mod sram {
    /// SRAM base address
    pub const BASE: u32 = 0x2000_0000;
    /// SRAM size (20 KB, medium-density devices)
    pub const SIZE: usize = 20 * 1024;
}

/// APB1/APB2/AHB peripheral space
pub mod peripherals {
    /// Start of the peripheral region
    pub const BASE: u32 = 0x4000_0000;
    /// End of the peripheral region (exclusive)
    pub const END: u32 = 0x5000_0000;
}

/// Size of the Cortex-M vector table entries the emulator reads at boot
/// (initial stack pointer followed by the reset handler).
pub const BOOT_VECTOR_BYTES: usize = 8;
