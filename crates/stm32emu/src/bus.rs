//! System bus: the table of attached devices and the dispatcher in front of them.
//!
//! Every guest access to the peripheral region lands here first. The bus
//! finds the window that claims the address, enforces that window's
//! [`AccessPolicy`](crate::device::AccessPolicy) and only then calls into the
//! device with a window-relative offset. Rejected accesses never reach the
//! device.

use crate::control::SystemControl;
use crate::device::{DeviceFactory, FactoryError, MmioDevice};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Reasons the bus refuses an access or an attachment
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("no device claims address {addr:#X}")]
    Unmapped { addr: u64 },
    #[error("{device} does not accept {size}-byte accesses (addr={addr:#X})")]
    AccessSize {
        device: &'static str,
        addr: u64,
        size: usize,
    },
    #[error("{device} does not accept unaligned {size}-byte access at {addr:#X}")]
    Unaligned {
        device: &'static str,
        addr: u64,
        size: usize,
    },
    #[error("{size}-byte access at {addr:#X} runs past the end of the {device} window")]
    OutOfWindow {
        device: &'static str,
        addr: u64,
        size: usize,
    },
    #[error("window {base:#X}+{size:#X} overlaps {existing} at {existing_base:#X}")]
    Overlap {
        base: u64,
        size: u64,
        existing: &'static str,
        existing_base: u64,
    },
    #[error("window {base:#X}+{size:#X} runs past the end of the address space")]
    WindowOverflow { base: u64, size: u64 },
    #[error(transparent)]
    Factory(#[from] FactoryError),
}

struct Region {
    base: u64,
    size: u64,
    device: Box<dyn MmioDevice>,
}

impl Region {
    /// Exclusive end; `attach` guarantees it does not overflow
    fn end(&self) -> u64 {
        self.base + self.size
    }

    fn contains(&self, addr: u64) -> bool {
        (self.base..self.end()).contains(&addr)
    }
}

/// Bus that owns every attached device
#[derive(Default)]
pub struct SystemBus {
    regions: Vec<Region>,
}

impl fmt::Debug for SystemBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.devices()
                    .map(|(base, name, size)| format!("{name}@{base:#X}+{size:#X}")),
            )
            .finish()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the device's window starting at `base`
    pub fn attach(&mut self, base: u64, device: Box<dyn MmioDevice>) -> Result<(), BusError> {
        let size = device.window_size();
        let end = base
            .checked_add(size)
            .ok_or(BusError::WindowOverflow { base, size })?;
        if let Some(existing) = self
            .regions
            .iter()
            .find(|r| base < r.end() && r.base < end)
        {
            return Err(BusError::Overlap {
                base,
                size,
                existing: existing.device.name(),
                existing_base: existing.base,
            });
        }

        debug!(
            "Attached {} at {:#X} - {:#X}",
            device.name(),
            base,
            end
        );
        self.regions.push(Region { base, size, device });
        Ok(())
    }

    /// Instantiate the named device type and attach it at `base`
    pub fn attach_from(
        &mut self,
        factory: &DeviceFactory,
        name: &str,
        base: u64,
    ) -> Result<(), BusError> {
        let device = factory.create(name)?;
        self.attach(base, device)
    }

    /// Attached windows as `(base, device name, window size)`
    pub fn devices(&self) -> impl Iterator<Item = (u64, &'static str, u64)> + '_ {
        self.regions
            .iter()
            .map(|r| (r.base, r.device.name(), r.size))
    }

    /// Reset every attached device, in attach order
    pub fn reset(&mut self) {
        info!("Resetting {} bus device(s)", self.regions.len());
        for region in &mut self.regions {
            region.device.reset();
        }
    }

    pub fn read(&mut self, addr: u64, size: usize) -> Result<u64, BusError> {
        let (region, offset) = self.route(addr, size)?;
        let value = region.device.read(offset, size);
        trace!(
            "{} read: offset={:#X}, size={}, value={:#X}",
            region.device.name(),
            offset,
            size,
            value
        );
        Ok(value)
    }

    pub fn write(
        &mut self,
        addr: u64,
        size: usize,
        value: u64,
        ctl: &mut dyn SystemControl,
    ) -> Result<(), BusError> {
        let (region, offset) = self.route(addr, size)?;
        trace!(
            "{} write: offset={:#X}, size={}, value={:#X}",
            region.device.name(),
            offset,
            size,
            value
        );
        region.device.write(ctl, offset, size, value);
        Ok(())
    }

    /// Find the window claiming `addr` and check the access against its policy
    fn route(&mut self, addr: u64, size: usize) -> Result<(&mut Region, u64), BusError> {
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .ok_or(BusError::Unmapped { addr })?;

        let device = region.device.name();
        let policy = region.device.access_policy();
        let offset = addr - region.base;

        if !policy.size_permitted(size) {
            return Err(BusError::AccessSize { device, addr, size });
        }
        if !policy.alignment_permitted(offset, size) {
            return Err(BusError::Unaligned { device, addr, size });
        }
        if offset + size as u64 > region.size {
            return Err(BusError::OutOfWindow { device, addr, size });
        }

        Ok((region, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::EmulatorControl;
    use crate::mmio::pwr::PwrDevice;

    const PWR_BASE: u64 = 0x4000_7000;

    fn pwr_bus() -> SystemBus {
        let mut bus = SystemBus::new();
        bus.attach_from(&DeviceFactory::with_builtin_devices(), "stm32_pwr", PWR_BASE)
            .unwrap();
        bus
    }

    #[test]
    fn dispatches_with_window_relative_offset() {
        let mut bus = pwr_bus();
        let mut ctl = EmulatorControl::new();

        bus.write(PWR_BASE + 4, 4, 0x1234_5678, &mut ctl).unwrap();
        assert_eq!(bus.read(PWR_BASE + 4, 4), Ok(0x1234_5678));
        assert_eq!(bus.read(PWR_BASE, 4), Ok(0));
        assert_eq!(ctl.shutdown_requests(), 1);
    }

    #[test]
    fn rejects_narrow_accesses_before_dispatch() {
        let mut bus = pwr_bus();
        let mut ctl = EmulatorControl::new();

        for size in [1, 2, 8] {
            assert!(matches!(
                bus.write(PWR_BASE, size, 0xFF, &mut ctl),
                Err(BusError::AccessSize { device: "stm32_pwr", .. })
            ));
            assert!(matches!(
                bus.read(PWR_BASE, size),
                Err(BusError::AccessSize { .. })
            ));
        }
        assert!(!ctl.shutdown_requested());
        assert_eq!(bus.read(PWR_BASE, 4), Ok(0));
    }

    #[test]
    fn rejects_unaligned_access() {
        let mut bus = pwr_bus();
        let mut ctl = EmulatorControl::new();

        assert_eq!(
            bus.write(PWR_BASE + 2, 4, 1, &mut ctl),
            Err(BusError::Unaligned {
                device: "stm32_pwr",
                addr: PWR_BASE + 2,
                size: 4,
            })
        );
        assert!(!ctl.shutdown_requested());
    }

    #[test]
    fn rejects_access_past_window_end() {
        let mut bus = pwr_bus();
        let mut ctl = EmulatorControl::new();

        // 0x3FC + 4 is one byte past the 0x3FF-byte window.
        assert!(matches!(
            bus.write(PWR_BASE + 0x3FC, 4, 1, &mut ctl),
            Err(BusError::OutOfWindow { .. })
        ));
        assert_eq!(bus.read(PWR_BASE + 0x3F8, 4), Ok(0));
        assert!(!ctl.shutdown_requested());
    }

    #[test]
    fn rejects_unclaimed_addresses() {
        let mut bus = pwr_bus();
        let mut ctl = EmulatorControl::new();

        assert_eq!(
            bus.read(PWR_BASE + 0x400, 4),
            Err(BusError::Unmapped {
                addr: PWR_BASE + 0x400
            })
        );
        assert!(bus.write(0x4000_0000, 4, 1, &mut ctl).is_err());
        assert!(!ctl.shutdown_requested());
    }

    #[test]
    fn overlapping_windows_are_refused() {
        let mut bus = pwr_bus();
        let err = bus
            .attach(PWR_BASE + 0x100, Box::new(PwrDevice::new()))
            .unwrap_err();
        assert_eq!(
            err,
            BusError::Overlap {
                base: PWR_BASE + 0x100,
                size: 0x3FF,
                existing: "stm32_pwr",
                existing_base: PWR_BASE,
            }
        );

        // Adjacent windows are fine.
        bus.attach(PWR_BASE + 0x400, Box::new(PwrDevice::new()))
            .unwrap();
        assert_eq!(bus.devices().count(), 2);
    }

    #[test]
    fn window_past_address_space_end_is_refused() {
        let mut bus = SystemBus::new();
        assert_eq!(
            bus.attach(u64::MAX - 0x10, Box::new(PwrDevice::new())),
            Err(BusError::WindowOverflow {
                base: u64::MAX - 0x10,
                size: 0x3FF,
            })
        );
        assert_eq!(bus.devices().count(), 0);

        // The highest window whose exclusive end is still representable.
        bus.attach(u64::MAX - 0x3FF, Box::new(PwrDevice::new()))
            .unwrap();
        assert_eq!(bus.read(u64::MAX - 0x3FF, 4), Ok(0));
    }

    #[test]
    fn unknown_device_type_fails_attach() {
        let mut bus = SystemBus::new();
        assert!(matches!(
            bus.attach_from(&DeviceFactory::new(), "stm32_pwr", PWR_BASE),
            Err(BusError::Factory(FactoryError::Unknown(_)))
        ));
    }

    #[test]
    fn reset_reaches_every_device() {
        let mut bus = pwr_bus();
        bus.attach(PWR_BASE + 0x400, Box::new(PwrDevice::new()))
            .unwrap();
        let mut ctl = EmulatorControl::new();

        bus.write(PWR_BASE, 4, 0xAA, &mut ctl).unwrap();
        bus.write(PWR_BASE + 0x404, 4, 0xBB, &mut ctl).unwrap();
        bus.reset();

        assert_eq!(bus.read(PWR_BASE, 4), Ok(0));
        assert_eq!(bus.read(PWR_BASE + 0x404, 4), Ok(0));
    }
}
