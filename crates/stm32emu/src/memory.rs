//! Memory setup utilities for STM32 emulation.
//!
//! This module maps flash, SRAM and the peripheral region into the CPU
//! engine and loads firmware images into flash.

use crate::core::EmulatorError;
use crate::firmware::FirmwareImage;
use crate::mmio;
use stm32_hw::memory_map;
use tracing::debug;
use unicorn_engine::{Unicorn, unicorn_const::Prot};

// Memory constants from hardware definitions
const FLASH_BASE: u32 = memory_map::flash::BASE;
const FLASH_SIZE: usize = memory_map::flash::SIZE;
const SRAM_BASE: u32 = memory_map::sram::BASE;
const SRAM_SIZE: usize = memory_map::sram::SIZE;

const PERIPHERAL_BASE: u32 = memory_map::peripherals::BASE;
const PERIPHERAL_END: u32 = memory_map::peripherals::END;

/// Set up the STM32 memory map
pub fn setup_memory(emu: &mut Unicorn<'_, mmio::EmulatorState>) -> Result<(), EmulatorError> {
    debug!(
        "  Mapping flash at {:#X} ({}KB)",
        FLASH_BASE,
        FLASH_SIZE / 1024
    );
    emu.mem_map(FLASH_BASE as u64, FLASH_SIZE as u64, Prot::ALL)
        .map_err(EmulatorError::unicorn("map flash"))?;

    debug!("  Mapping SRAM at {:#X} ({}KB)", SRAM_BASE, SRAM_SIZE / 1024);
    emu.mem_map(SRAM_BASE as u64, SRAM_SIZE as u64, Prot::ALL)
        .map_err(EmulatorError::unicorn("map SRAM"))?;

    debug!(
        "  Mapping peripheral MMIO region {:#X} - {:#X}",
        PERIPHERAL_BASE, PERIPHERAL_END
    );
    emu.mmio_map(
        PERIPHERAL_BASE as u64,
        (PERIPHERAL_END - PERIPHERAL_BASE) as u64,
        Some(mmio::read_handler),
        Some(mmio::write_handler),
    )
    .map_err(EmulatorError::unicorn("map peripheral region"))?;

    Ok(())
}

/// Copy a firmware image to the start of flash
pub fn load_firmware(
    emu: &mut Unicorn<'_, mmio::EmulatorState>,
    image: &FirmwareImage,
) -> Result<(), EmulatorError> {
    debug!(
        "  Loading {} bytes of firmware at {:#X}",
        image.data.len(),
        FLASH_BASE
    );
    emu.mem_write(FLASH_BASE as u64, &image.data)
        .map_err(EmulatorError::unicorn("write firmware to flash"))
}
