pub mod args;
pub mod bus;
pub mod control;
pub mod core;
pub mod device;
pub mod firmware;
pub mod machine;
pub mod memory;
pub mod mmio;
pub mod scheduler;

// Re-export commonly used types
pub use args::{Args, load_firmware_data};
pub use bus::{BusError, SystemBus};
pub use control::{EmulatorControl, SystemControl};
pub use core::{EmulatorConfig, EmulatorCore, EmulatorError, StopReason};
pub use device::{AccessPolicy, DeviceDescriptor, DeviceFactory, FactoryError, MmioDevice};
pub use firmware::{FirmwareError, FirmwareImage};
pub use mmio::{EmulatorState, PwrDevice};
pub use scheduler::{QuantumResult, SchedulerConfig};
