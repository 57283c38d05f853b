/// CPU frequency specifications
pub mod cpu {
    /// Maximum SYSCLK frequency (72 MHz)
    pub const SYSCLK_HZ: u64 = 72_000_000;
}
