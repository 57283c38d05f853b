//! STM32 power control (PWR) register block.
//!
//! Two 32-bit registers, CR and CSR, in a 0x3FF-byte window. Reads return
//! the stored value. Any write to the window, whatever the offset or value,
//! requests a shutdown of the whole emulator before the register is updated.
//! The low-power modes the bits select on real silicon are not modelled;
//! they are only decoded for the debug log.
//!
//! # References
//! - RM0008 section 5.4, "Power control registers"

use crate::control::SystemControl;
use crate::device::{AccessPolicy, DeviceDescriptor, MmioDevice};
use stm32_hw::mmio::pwr::{self as hw_pwr, cr, csr, registers as hw_regs};
use tracing::{debug, trace};

const CR: u64 = hw_regs::CR as u64;
const CSR: u64 = hw_regs::CSR as u64;

/// PWR register state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PwrDevice {
    /// PWR_CR
    pub cr: u32,
    /// PWR_CSR
    pub csr: u32,
}

impl PwrDevice {
    pub const NAME: &'static str = "stm32_pwr";

    pub const DESCRIPTOR: DeviceDescriptor = DeviceDescriptor {
        name: Self::NAME,
        window_size: hw_pwr::WINDOW_SIZE as u64,
        construct: construct_pwr,
    };

    pub fn new() -> Self {
        Self::default()
    }
}

fn construct_pwr() -> Box<dyn MmioDevice> {
    Box::new(PwrDevice::new())
}

impl MmioDevice for PwrDevice {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn window_size(&self) -> u64 {
        hw_pwr::WINDOW_SIZE as u64
    }

    fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::WORD_ONLY
    }

    fn read(&mut self, offset: u64, _size: usize) -> u64 {
        trace!("pwr: read offset={:#X}", offset);

        match offset {
            CR => self.cr as u64,
            CSR => self.csr as u64,
            _ => 0,
        }
    }

    fn write(&mut self, ctl: &mut dyn SystemControl, offset: u64, _size: usize, value: u64) {
        ctl.request_shutdown(Self::NAME);

        let value = (value & 0xFFFF_FFFF) as u32;
        match offset {
            CR => {
                self.cr = value;
                debug!("pwr: CR = {:#010X} {}", value, describe_cr(value));
            }
            CSR => {
                self.csr = value;
                debug!("pwr: CSR = {:#010X} {}", value, describe_csr(value));
            }
            _ => {
                trace!(
                    "pwr: ignoring write to unused offset={:#X}, value={:#X}",
                    offset, value
                );
            }
        }
    }

    fn reset(&mut self) {
        self.cr = 0;
        self.csr = 0;
    }
}

fn flag_names(value: u32, flags: &[(u32, &'static str)]) -> String {
    let names: Vec<&str> = flags
        .iter()
        .filter(|(mask, _)| value & mask != 0)
        .map(|&(_, name)| name)
        .collect();
    format!("[{}]", names.join(" "))
}

fn describe_cr(value: u32) -> String {
    let flags = flag_names(
        value,
        &[
            (cr::LPDS, "LPDS"),
            (cr::PDDS, "PDDS"),
            (cr::CWUF, "CWUF"),
            (cr::CSBF, "CSBF"),
            (cr::PVDE, "PVDE"),
            (cr::DBP, "DBP"),
        ],
    );
    format!("{} PLS={}", flags, (value & cr::PLS_MASK) >> 5)
}

fn describe_csr(value: u32) -> String {
    flag_names(
        value,
        &[
            (csr::WUF, "WUF"),
            (csr::SBF, "SBF"),
            (csr::PVDO, "PVDO"),
            (csr::EWUP, "EWUP"),
        ],
    )
}
