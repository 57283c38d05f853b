//! Memory-Mapped I/O (MMIO) handling for STM32 emulation.
//!
//! The whole peripheral region is mapped in the CPU engine with a single pair
//! of handlers. They forward every access to the [`SystemBus`], which routes
//! it to the device that claims the address.
//!
//! # Memory Map
//! According to RM0008 section 3.3:
//! - `0x08000000-0x08020000`: Main flash (128KB on medium-density parts)
//! - `0x20000000-0x20005000`: SRAM (20KB)
//! - `0x40000000-0x50000000`: Peripherals
//!   - `0x40007000-0x400073FF`: PWR

use crate::bus::{BusError, SystemBus};
use crate::control::EmulatorControl;
use stm32_hw::memory_map;
use tracing::{instrument, trace, warn};
use unicorn_engine::Unicorn;

pub mod pwr;

pub use pwr::PwrDevice;

const PERIPHERAL_BASE: u64 = memory_map::peripherals::BASE as u64;

/// Shared emulator state accessible from MMIO callbacks and main loop
#[derive(Debug)]
pub struct EmulatorState {
    pub bus: SystemBus,
    pub control: EmulatorControl,
    /// Instructions the core has started, counted by a code hook
    pub instructions: usize,
}

impl EmulatorState {
    pub fn new(bus: SystemBus) -> Self {
        Self {
            bus,
            control: EmulatorControl::new(),
            instructions: 0,
        }
    }

    /// Bus read on behalf of the guest.
    ///
    /// Accesses the bus refuses behave like unassigned memory: they read as
    /// zero and are logged.
    pub fn guest_read(&mut self, addr: u64, size: usize) -> u64 {
        match self.bus.read(addr, size) {
            Ok(value) => value,
            Err(e) => {
                log_rejected(&e);
                0
            }
        }
    }

    /// Bus write on behalf of the guest. Refused accesses are dropped.
    pub fn guest_write(&mut self, addr: u64, size: usize, value: u64) {
        if let Err(e) = self.bus.write(addr, size, value, &mut self.control) {
            log_rejected(&e);
        }
    }
}

fn log_rejected(e: &BusError) {
    match e {
        // Most of the peripheral space has no model yet.
        BusError::Unmapped { addr } => trace!("Unimplemented peripheral access: addr={:#X}", addr),
        _ => warn!("Rejected bus access: {}", e),
    }
}

// ============================================================================
// Unicorn MMIO Adapters
// ============================================================================

/// MMIO read handler for the peripheral region
///
/// Unicorn passes `addr` relative to the start of the mapping.
#[instrument(level = "trace", skip(uc))]
pub fn read_handler(uc: &mut Unicorn<'_, EmulatorState>, addr: u64, size: usize) -> u64 {
    uc.get_data_mut().guest_read(PERIPHERAL_BASE + addr, size)
}

/// MMIO write handler for the peripheral region
///
/// Stops the engine as soon as a device has requested shutdown, so the run
/// loop sees the request before the guest executes another instruction.
#[instrument(level = "trace", skip(uc))]
pub fn write_handler(uc: &mut Unicorn<'_, EmulatorState>, addr: u64, size: usize, value: u64) {
    let state = uc.get_data_mut();
    state.guest_write(PERIPHERAL_BASE + addr, size, value);

    if state.control.shutdown_requested()
        && let Err(e) = uc.emu_stop()
    {
        warn!("Failed to stop emulation after shutdown request: {:?}", e);
    }
}
