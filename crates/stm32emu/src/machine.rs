//! Board definition: which devices sit where on the system bus.

use crate::bus::{BusError, SystemBus};
use crate::device::DeviceFactory;
use crate::mmio::PwrDevice;
use stm32_hw::mmio::pwr as hw_pwr;
use tracing::info;

/// Devices of the STM32F1 board, as `(device type, base address)`
pub const BOARD_DEVICES: &[(&str, u32)] = &[(PwrDevice::NAME, hw_pwr::BASE)];

/// Instantiate every board device through `factory` and attach it to a new bus
pub fn build_bus(factory: &DeviceFactory) -> Result<SystemBus, BusError> {
    let mut bus = SystemBus::new();
    for &(name, base) in BOARD_DEVICES {
        bus.attach_from(factory, name, base as u64)?;
    }
    info!("Board bus: {:?}", bus);
    Ok(bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FactoryError;

    #[test]
    fn board_places_pwr_at_its_base() {
        let bus = build_bus(&DeviceFactory::with_builtin_devices()).unwrap();
        let devices: Vec<_> = bus.devices().collect();
        assert_eq!(devices, vec![(0x4000_7000, "stm32_pwr", 0x3FF)]);
    }

    #[test]
    fn empty_factory_cannot_build_board() {
        assert_eq!(
            build_bus(&DeviceFactory::new()).unwrap_err(),
            BusError::Factory(FactoryError::Unknown("stm32_pwr".to_string()))
        );
    }
}
