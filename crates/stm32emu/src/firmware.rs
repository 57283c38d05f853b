//! Raw flash image loading.
//!
//! Images are plain binaries meant to be written at the start of flash. The
//! first two words are the Cortex-M boot vectors: the initial main stack
//! pointer and the address of the reset handler.

use stm32_hw::memory_map::{self, flash};
use thiserror::Error;

/// Errors that can occur during firmware parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FirmwareError {
    /// Image is too small to contain the boot vectors
    #[error("firmware image is {0} bytes, too small for the vector table")]
    TooSmall(usize),
    /// Image does not fit in flash
    #[error("firmware image is {size} bytes but flash holds {capacity}")]
    TooLarge { size: usize, capacity: usize },
    /// Reset vector lacks the Thumb bit; Cortex-M cores fault on it
    #[error("reset vector {0:#010X} does not have the Thumb bit set")]
    ResetVectorNotThumb(u32),
}

/// A flash image ready to be loaded
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    /// Initial main stack pointer (vector table word 0)
    pub initial_sp: u32,
    /// Reset handler address including the Thumb bit (vector table word 1)
    pub reset_vector: u32,
    pub data: Vec<u8>,
}

impl FirmwareImage {
    /// Parse a firmware image from raw file data
    pub fn parse(data: &[u8]) -> Result<Self, FirmwareError> {
        if data.len() < memory_map::BOOT_VECTOR_BYTES {
            return Err(FirmwareError::TooSmall(data.len()));
        }
        if data.len() > flash::SIZE {
            return Err(FirmwareError::TooLarge {
                size: data.len(),
                capacity: flash::SIZE,
            });
        }

        let initial_sp = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let reset_vector = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        if reset_vector & 1 == 0 {
            return Err(FirmwareError::ResetVectorNotThumb(reset_vector));
        }

        Ok(Self {
            initial_sp,
            reset_vector,
            data: data.to_vec(),
        })
    }

    /// Reset handler address with the Thumb bit cleared
    pub fn entry_point(&self) -> u32 {
        self.reset_vector & !1
    }
}
