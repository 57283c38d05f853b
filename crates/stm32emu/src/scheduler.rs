//! Quantum-based execution of the Cortex-M core.
//!
//! The core runs in slices of a fixed instruction count. Between slices the
//! scheduler checks stop conditions and whether a device has asked for
//! shutdown.

use crate::mmio;
use stm32_hw::specs;
use tracing::error;
use unicorn_engine::{RegisterARM, Unicorn};

// ================================================================================================
// Emulation Timing Constants
// ================================================================================================

/// Core clock the firmware is assumed to run at
pub const CPU_FREQ_HZ: usize = specs::cpu::SYSCLK_HZ as usize; // 72 MHz

/// Number of quanta per emulated millisecond
pub const QUANTUMS_PER_MS: usize = 1;

/// Instructions to execute per quantum (one instruction per cycle)
pub const INSTRUCTIONS_PER_QUANTUM: usize = CPU_FREQ_HZ / 1000 / QUANTUMS_PER_MS; // 72,000

/// Result of running a single quantum
#[derive(Debug, Clone, PartialEq)]
pub enum QuantumResult {
    /// Quantum completed successfully, continue execution
    Continue,
    /// A device requested shutdown during the quantum
    Shutdown,
    /// An error occurred during execution
    Error(String),
}

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Instructions per quantum
    pub quantum: usize,
    /// Stop when PC reaches this address
    pub stop_pc: Option<u64>,
    /// Stop after this many total instructions
    pub max_instructions: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum: INSTRUCTIONS_PER_QUANTUM,
            stop_pc: None,
            max_instructions: None,
        }
    }
}

/// Scheduler for the single Cortex-M core
pub struct Scheduler {
    config: SchedulerConfig,
    pc: u64,
    total_executed: usize,
    stopped: bool,
}

impl Scheduler {
    /// Create a new scheduler starting at `entry` (Thumb bit cleared)
    pub fn new(config: SchedulerConfig, entry: u64) -> Self {
        Self {
            config,
            pc: entry,
            total_executed: 0,
            stopped: false,
        }
    }

    /// Start over from `entry`, as after a system reset
    pub fn restart(&mut self, entry: u64) {
        self.pc = entry;
        self.total_executed = 0;
        self.stopped = false;
    }

    /// Check if the core reached the stop PC
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Get the current PC
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Get total instructions executed
    pub fn total_executed(&self) -> usize {
        self.total_executed
    }

    /// Check if any stop condition is met
    pub fn check_stop_conditions(&self) -> bool {
        if self.stopped {
            return true;
        }

        if let Some(stop_pc) = self.config.stop_pc
            && self.pc == stop_pc
        {
            return true;
        }

        if let Some(max) = self.config.max_instructions
            && self.total_executed >= max
        {
            return true;
        }

        false
    }

    fn is_stop_pc(&self, pc: u64) -> bool {
        self.config.stop_pc == Some(pc)
    }

    fn read_pc(emu: &Unicorn<'static, mmio::EmulatorState>) -> Result<u64, String> {
        emu.reg_read(RegisterARM::PC)
            .map_err(|e| format!("failed to read PC: {:?}", e))
    }

    /// Run a single quantum of execution
    pub fn run_quantum(&mut self, emu: &mut Unicorn<'static, mmio::EmulatorState>) -> QuantumResult {
        if self.stopped {
            return QuantumResult::Continue;
        }

        let _span = tracing::error_span!("CPU").entered();
        let until = self.config.stop_pc.unwrap_or(u64::MAX);
        let quantum = match self.config.max_instructions {
            Some(max) => self.config.quantum.min(max.saturating_sub(self.total_executed)),
            None => self.config.quantum,
        };
        // A count of zero means "no limit" to the engine.
        if quantum == 0 {
            return QuantumResult::Continue;
        }

        // Thumb state is selected by bit 0 of the start address.
        let before = emu.get_data().instructions;
        let started = emu.emu_start(self.pc | 1, until, 0, quantum);
        // The quantum may end early: at the stop PC, or when a device write
        // stopped the engine.
        self.total_executed += emu.get_data().instructions - before;

        self.pc = match Self::read_pc(emu) {
            Ok(pc) => pc,
            Err(e) => return QuantumResult::Error(e),
        };

        if let Err(e) = started {
            // Hitting the stop address is not an error
            if self.is_stop_pc(self.pc) {
                self.stopped = true;
            } else {
                error!("{:?}", e);
                return QuantumResult::Error(format!("CPU: {:?}", e));
            }
        }

        if self.is_stop_pc(self.pc) {
            self.stopped = true;
        }

        if emu.get_data().control.shutdown_requested() {
            return QuantumResult::Shutdown;
        }

        QuantumResult::Continue
    }
}
