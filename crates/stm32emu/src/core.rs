//! Core emulator API for STM32 emulation.
//!
//! This module provides the main emulator interface used by the headless
//! CLI and by integration tests.

use crate::bus::BusError;
use crate::device::DeviceFactory;
use crate::firmware::{FirmwareError, FirmwareImage};
use crate::scheduler::{QuantumResult, Scheduler, SchedulerConfig};
use crate::{machine, memory, mmio};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use unicorn_engine::{
    RegisterARM, Unicorn,
    unicorn_const::{Arch, Mode},
};

/// Errors that can occur while building or resetting the emulator
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("failed to parse firmware: {0}")]
    Firmware(#[from] FirmwareError),
    #[error("failed to build board: {0}")]
    Board(#[from] BusError),
    #[error("unicorn failed to {context}: {message}")]
    Unicorn {
        context: &'static str,
        message: String,
    },
}

impl EmulatorError {
    /// Adapter for `map_err` on unicorn results
    pub fn unicorn<E: fmt::Debug>(context: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Unicorn {
            context,
            message: format!("{:?}", e),
        }
    }
}

/// Configuration for the emulator
#[derive(Debug, Clone, Default)]
pub struct EmulatorConfig {
    /// Stop when PC reaches this address
    pub stop_pc: Option<u64>,
    /// Stop after this many instructions
    pub max_instructions: Option<usize>,
    /// Optional timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Result of running the emulator
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Reached a stop condition (PC match, max instructions)
    StopCondition,
    /// A device requested system shutdown
    Shutdown,
    /// Timeout reached
    Timeout,
    /// Emulation error occurred
    Error(String),
}

/// Core emulator for a single STM32 Cortex-M3
pub struct EmulatorCore {
    emu: Unicorn<'static, mmio::EmulatorState>,
    scheduler: Scheduler,
    image: FirmwareImage,

    // Configuration
    timeout_ms: Option<u64>,
    start_time: Instant,
}

impl EmulatorCore {
    /// Create a new emulator from raw firmware data
    pub fn new(firmware_data: &[u8], config: EmulatorConfig) -> Result<Self, EmulatorError> {
        Self::with_factory(firmware_data, config, &DeviceFactory::with_builtin_devices())
    }

    /// Create a new emulator whose board devices come from `factory`
    pub fn with_factory(
        firmware_data: &[u8],
        config: EmulatorConfig,
        factory: &DeviceFactory,
    ) -> Result<Self, EmulatorError> {
        let image = FirmwareImage::parse(firmware_data)?;
        info!("Initial SP: {:#X}", image.initial_sp);
        info!("Reset vector: {:#X}", image.reset_vector);

        info!("=== Board Setup ===");
        let bus = machine::build_bus(factory)?;
        let emu_state = mmio::EmulatorState::new(bus);

        info!("=== CPU Setup ===");
        let mut emu = Unicorn::new_with_data(Arch::ARM, Mode::THUMB | Mode::MCLASS, emu_state)
            .map_err(EmulatorError::unicorn("initialize Cortex-M core"))?;

        memory::setup_memory(&mut emu)?;
        memory::load_firmware(&mut emu, &image)?;

        // Count instructions for the scheduler
        emu.add_code_hook(0, u64::MAX, |uc, _addr, _size| {
            uc.get_data_mut().instructions += 1;
        })
        .map_err(EmulatorError::unicorn("add instruction counter hook"))?;

        let scheduler_config = SchedulerConfig {
            stop_pc: config.stop_pc,
            max_instructions: config.max_instructions,
            ..Default::default()
        };
        let scheduler = Scheduler::new(scheduler_config, image.entry_point() as u64);

        let mut core = Self {
            emu,
            scheduler,
            image,
            timeout_ms: config.timeout_ms,
            start_time: Instant::now(),
        };
        core.load_boot_vectors()?;
        Ok(core)
    }

    fn load_boot_vectors(&mut self) -> Result<(), EmulatorError> {
        self.emu
            .reg_write(RegisterARM::SP, self.image.initial_sp as u64)
            .map_err(EmulatorError::unicorn("set initial SP"))?;
        self.emu
            .reg_write(RegisterARM::PC, self.image.entry_point() as u64)
            .map_err(EmulatorError::unicorn("set reset vector"))?;
        Ok(())
    }

    /// System reset: every bus device returns to its reset state, any
    /// pending shutdown request is dropped and the core restarts from the
    /// boot vectors. Memory contents are kept.
    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        info!("=== System Reset ===");
        let state = self.emu.get_data_mut();
        state.bus.reset();
        state.control.clear();

        self.load_boot_vectors()?;
        self.scheduler.restart(self.image.entry_point() as u64);
        self.start_time = Instant::now();
        Ok(())
    }

    /// Run a single quantum of execution
    pub fn step(&mut self) -> QuantumResult {
        self.scheduler.run_quantum(&mut self.emu)
    }

    /// Why the emulator should stop now, if it should.
    ///
    /// A pending shutdown request takes precedence over the other conditions.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.shutdown_requested() {
            return Some(StopReason::Shutdown);
        }
        if self.timed_out() {
            return Some(StopReason::Timeout);
        }
        if self.scheduler.check_stop_conditions() {
            return Some(StopReason::StopCondition);
        }
        None
    }

    /// Check if any stop condition is met
    pub fn should_stop(&self) -> bool {
        self.stop_reason().is_some()
    }

    fn timed_out(&self) -> bool {
        if let Some(timeout_ms) = self.timeout_ms {
            let elapsed_ms = self.start_time.elapsed().as_millis() as u64;
            if elapsed_ms >= timeout_ms {
                info!("Timeout reached: {} ms", elapsed_ms);
                return true;
            }
        }
        false
    }

    /// Run until a stop condition is reached
    pub fn run(&mut self) -> StopReason {
        loop {
            if let Some(reason) = self.stop_reason() {
                return reason;
            }

            match self.step() {
                QuantumResult::Continue => {}
                QuantumResult::Shutdown => return StopReason::Shutdown,
                QuantumResult::Error(e) => return StopReason::Error(e),
            }
        }
    }

    /// Whether a device has asked for shutdown since start or the last reset
    pub fn shutdown_requested(&self) -> bool {
        self.emu.get_data().control.shutdown_requested()
    }

    /// Get the current PC
    pub fn pc(&self) -> u64 {
        self.scheduler.pc()
    }

    /// Check if the core has stopped (reached the stop PC)
    pub fn stopped(&self) -> bool {
        self.scheduler.stopped()
    }

    /// Get total instructions executed
    pub fn total_executed(&self) -> usize {
        self.scheduler.total_executed()
    }

    /// Get elapsed time since start or the last reset
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Read a core register
    pub fn reg(&self, reg: RegisterARM) -> u64 {
        self.emu.reg_read(reg).unwrap_or(0)
    }

    /// Shared state seen by the MMIO handlers (bus and control service)
    pub fn state(&self) -> &mmio::EmulatorState {
        self.emu.get_data()
    }

    /// Mutable access to the bus and control service, e.g. for host-side pokes
    pub fn state_mut(&mut self) -> &mut mmio::EmulatorState {
        self.emu.get_data_mut()
    }

    /// Print final emulator state
    pub fn print_final_state(&self) {
        info!("Total instructions executed: {}", self.total_executed());
        info!("Elapsed time: {:.2?}", self.elapsed());

        let control = &self.state().control;
        info!(
            "Shutdown requests: {} (last from {:?})",
            control.shutdown_requests(),
            control.last_source()
        );

        info!(
            "CPU: pc={:#x} r0={:#x} r1={:#x} r2={:#x} r3={:#x} sp={:#x} lr={:#x}",
            self.pc(),
            self.reg(RegisterARM::R0),
            self.reg(RegisterARM::R1),
            self.reg(RegisterARM::R2),
            self.reg(RegisterARM::R3),
            self.reg(RegisterARM::SP),
            self.reg(RegisterARM::LR)
        );
    }
}
