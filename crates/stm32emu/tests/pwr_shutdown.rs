//! End-to-end tests: guest firmware touching PWR on the real CPU engine.
//!
//! The firmware images are assembled by hand. Each starts with the two boot
//! vectors (SP = top of SRAM, reset handler = 0x08000008 | Thumb) followed by
//! Thumb code and its literal pool.

use stm32emu::{EmulatorConfig, EmulatorCore, StopReason};

const PWR_BASE: u64 = 0x4000_7000;
const STACK_TOP: u32 = 0x2000_5000;
const RESET_HANDLER: u32 = 0x0800_0009;

fn image(code: &[u16], literals: &[u32]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&STACK_TOP.to_le_bytes());
    data.extend_from_slice(&RESET_HANDLER.to_le_bytes());
    for insn in code {
        data.extend_from_slice(&insn.to_le_bytes());
    }
    for word in literals {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data
}

/// 0x08: ldr r0, =0x40007000
/// 0x0A: ldr r1, =value
/// 0x0C: str r1, [r0, #offset]
/// 0x0E: b .
fn store_to_pwr(store: u16, value: u32) -> Vec<u8> {
    image(&[0x4801, 0x4902, store, 0xE7FE], &[PWR_BASE as u32, value])
}

const STR_R1_R0_CR: u16 = 0x6001;
const STR_R1_R0_CSR: u16 = 0x6041;

/// 0x08: ldr r0, =0x40007000
/// 0x0A: ldr r1, [r0, #0]
/// 0x0C: b .
/// 0x0E: nop
fn read_pwr_cr() -> Vec<u8> {
    image(&[0x4801, 0x6801, 0xE7FE, 0xBF00], &[PWR_BASE as u32])
}

fn core(data: &[u8], config: EmulatorConfig) -> EmulatorCore {
    EmulatorCore::new(data, config).expect("emulator should build")
}

#[test]
fn store_to_control_register_shuts_down() {
    let mut emu = core(
        &store_to_pwr(STR_R1_R0_CR, 0xDEAD_BEEF),
        EmulatorConfig {
            max_instructions: Some(1_000),
            ..Default::default()
        },
    );

    assert_eq!(emu.run(), StopReason::Shutdown);
    assert!(emu.should_stop());
    assert_eq!(emu.stop_reason(), Some(StopReason::Shutdown));
    // Only the instructions up to the store ran, not the whole quantum.
    assert!(emu.total_executed() >= 3);
    assert!(emu.total_executed() < 1_000);

    let state = emu.state_mut();
    assert_eq!(state.control.shutdown_requests(), 1);
    assert_eq!(state.control.last_source(), Some("stm32_pwr"));
    assert_eq!(state.bus.read(PWR_BASE, 4), Ok(0xDEAD_BEEF));
    assert_eq!(state.bus.read(PWR_BASE + 4, 4), Ok(0));
}

#[test]
fn store_to_status_register_shuts_down() {
    let mut emu = core(
        &store_to_pwr(STR_R1_R0_CSR, 0x1),
        EmulatorConfig {
            max_instructions: Some(1_000),
            ..Default::default()
        },
    );

    assert_eq!(emu.run(), StopReason::Shutdown);
    assert_eq!(emu.state_mut().bus.read(PWR_BASE + 4, 4), Ok(0x1));
    assert_eq!(emu.state_mut().bus.read(PWR_BASE, 4), Ok(0));
}

#[test]
fn system_reset_clears_pwr_and_pending_shutdown() {
    let mut emu = core(
        &store_to_pwr(STR_R1_R0_CSR, 0x1),
        EmulatorConfig {
            max_instructions: Some(1_000),
            ..Default::default()
        },
    );
    assert_eq!(emu.run(), StopReason::Shutdown);

    emu.reset().unwrap();
    assert!(!emu.shutdown_requested());
    assert!(!emu.should_stop());
    assert_eq!(emu.pc(), 0x0800_0008);
    assert_eq!(emu.state_mut().bus.read(PWR_BASE + 4, 4), Ok(0));

    // The firmware runs again from the reset vector and shuts down again.
    assert_eq!(emu.run(), StopReason::Shutdown);
    assert_eq!(emu.state().control.shutdown_requests(), 1);
}

#[test]
fn reads_do_not_shut_down() {
    let mut emu = core(
        &read_pwr_cr(),
        EmulatorConfig {
            max_instructions: Some(100),
            ..Default::default()
        },
    );

    assert_eq!(emu.run(), StopReason::StopCondition);
    assert!(!emu.shutdown_requested());
    assert_eq!(emu.stop_reason(), Some(StopReason::StopCondition));
    assert_eq!(emu.reg(unicorn_engine::RegisterARM::R1), 0);
}

#[test]
fn stops_at_requested_pc() {
    let mut emu = core(
        &read_pwr_cr(),
        EmulatorConfig {
            stop_pc: Some(0x0800_000C),
            max_instructions: Some(1_000),
            ..Default::default()
        },
    );

    assert_eq!(emu.run(), StopReason::StopCondition);
    assert!(emu.stopped());
    assert_eq!(emu.pc(), 0x0800_000C);
    // Two loads ran before the stop address.
    assert_eq!(emu.total_executed(), 2);
}

#[test]
fn rejects_malformed_firmware() {
    assert!(EmulatorCore::new(&[0u8; 4], EmulatorConfig::default()).is_err());
}
