//! Device model interface and the factory that instantiates devices by name.
//!
//! A device is anything implementing [`MmioDevice`]: it claims a window of
//! bus addresses, answers reads and writes at offsets within that window
//! and returns to its power-on state on reset. Devices are made available to
//! machines by registering a [`DeviceDescriptor`] with a [`DeviceFactory`]
//! while the emulator is being built.

use crate::control::SystemControl;
use crate::mmio::pwr::PwrDevice;
use thiserror::Error;
use tracing::debug;

/// Access widths and alignment a device window accepts.
///
/// The bus checks every access against this before dispatching, so device
/// handlers only ever see accesses that satisfy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Smallest access width in bytes
    pub min_size: usize,
    /// Largest access width in bytes
    pub max_size: usize,
    /// Whether accesses not aligned to their own width are allowed
    pub unaligned: bool,
}

impl AccessPolicy {
    /// Only naturally aligned 32-bit accesses
    pub const WORD_ONLY: Self = Self {
        min_size: 4,
        max_size: 4,
        unaligned: false,
    };

    pub fn size_permitted(&self, size: usize) -> bool {
        (self.min_size..=self.max_size).contains(&size)
    }

    pub fn alignment_permitted(&self, offset: u64, size: usize) -> bool {
        self.unaligned || size == 0 || offset % size as u64 == 0
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 4,
            unaligned: false,
        }
    }
}

/// A memory-mapped device that can be attached to a [`SystemBus`](crate::bus::SystemBus).
pub trait MmioDevice {
    /// Type name, as registered with the factory
    fn name(&self) -> &'static str;

    /// Size in bytes of the address window this device claims
    fn window_size(&self) -> u64;

    fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::default()
    }

    /// Handle a read at `offset` bytes into the window
    fn read(&mut self, offset: u64, size: usize) -> u64;

    /// Handle a write at `offset` bytes into the window
    fn write(&mut self, ctl: &mut dyn SystemControl, offset: u64, size: usize, value: u64);

    /// Return to power-on state
    fn reset(&mut self);
}

/// Everything the factory needs to know to build a device
#[derive(Debug, Clone, Copy)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    /// Size of the window instances of this device claim
    pub window_size: u64,
    pub construct: fn() -> Box<dyn MmioDevice>,
}

/// Errors that can occur when registering or creating devices
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("device type {0:?} is already registered")]
    Duplicate(&'static str),
    #[error("unknown device type {0:?}")]
    Unknown(String),
}

/// Table of device types a machine can instantiate
#[derive(Debug, Default)]
pub struct DeviceFactory {
    descriptors: Vec<DeviceDescriptor>,
}

impl DeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every device model this crate provides
    pub fn with_builtin_devices() -> Self {
        Self {
            descriptors: vec![PwrDevice::DESCRIPTOR],
        }
    }

    /// Add a device type. Names must be unique.
    pub fn register(&mut self, descriptor: DeviceDescriptor) -> Result<(), FactoryError> {
        if self.descriptor(descriptor.name).is_some() {
            return Err(FactoryError::Duplicate(descriptor.name));
        }
        debug!(
            "Registered device type {} (window {:#X})",
            descriptor.name, descriptor.window_size
        );
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Registered descriptors, in registration order
    pub fn descriptors(&self) -> &[DeviceDescriptor] {
        &self.descriptors
    }

    /// Construct a fresh instance of the named device type
    pub fn create(&self, name: &str) -> Result<Box<dyn MmioDevice>, FactoryError> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| FactoryError::Unknown(name.to_string()))?;
        Ok((descriptor.construct)())
    }
}
