//! # References
//! - RM0008 section 5.4, "Power control registers"

/// PWR register block base address (APB1)
pub const BASE: u32 = 0x4000_7000;

/// Size of the address window the PWR block claims on the bus
pub const WINDOW_SIZE: u32 = 0x3FF;

/// PWR register offsets (relative to `BASE`)
pub mod registers {
    /// Power control register (PWR_CR)
    ///
    /// Reference: RM0008 section 5.4.1
    pub const CR: u32 = 0x00;

    /// Power control/status register (PWR_CSR)
    ///
    /// Reference: RM0008 section 5.4.2
    pub const CSR: u32 = 0x04;
}

/// PWR_CR bit fields
pub mod cr {
    /// Low-power deepsleep
    pub const LPDS: u32 = 1 << 0;
    /// Power down deepsleep (enter Standby instead of Stop)
    pub const PDDS: u32 = 1 << 1;
    /// Clear wakeup flag
    pub const CWUF: u32 = 1 << 2;
    /// Clear standby flag
    pub const CSBF: u32 = 1 << 3;
    /// Power voltage detector enable
    pub const PVDE: u32 = 1 << 4;
    /// PVD level selection (bits 7:5)
    pub const PLS_MASK: u32 = 0b111 << 5;
    /// Disable backup domain write protection
    pub const DBP: u32 = 1 << 8;
}

/// PWR_CSR bit fields
pub mod csr {
    /// Wakeup flag
    pub const WUF: u32 = 1 << 0;
    /// Standby flag
    pub const SBF: u32 = 1 << 1;
    /// PVD output
    pub const PVDO: u32 = 1 << 2;
    /// Enable WKUP pin
    pub const EWUP: u32 = 1 << 8;
}
