use clap::Parser;
use stm32emu::{Args, DeviceFactory, EmulatorCore, StopReason, load_firmware_data, machine};
use tracing::info;

fn list_devices() -> i32 {
    let factory = DeviceFactory::with_builtin_devices();

    println!("Registered device types:");
    for descriptor in factory.descriptors() {
        println!(
            "  {:<16} window {:#06X}",
            descriptor.name, descriptor.window_size
        );
    }

    match machine::build_bus(&factory) {
        Ok(bus) => {
            println!("Board layout:");
            for (base, name, size) in bus.devices() {
                println!("  {:#010X} - {:#010X}  {}", base, base + size, name);
            }
            0
        }
        Err(e) => {
            eprintln!("Failed to build board: {}", e);
            2
        }
    }
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if args.list_devices {
        std::process::exit(list_devices());
    }

    // Load firmware
    let firmware_data = match load_firmware_data(&args) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to load firmware: {}", e);
            std::process::exit(2);
        }
    };

    // Create emulator config from args
    let config = args.to_emulator_config();

    // Create emulator
    info!("=== Creating Emulator ===");
    let mut emulator = match EmulatorCore::new(&firmware_data, config) {
        Ok(emu) => emu,
        Err(e) => {
            eprintln!("Failed to create emulator: {}", e);
            std::process::exit(2);
        }
    };

    info!("Entry: {:#X}", emulator.pc());

    // Run emulator
    info!("=== Running Emulator (Headless) ===");
    let stop_reason = emulator.run();

    // Log final state
    info!("=== Emulation Complete ===");
    info!("Stop reason: {:?}", stop_reason);
    info!("PC: {:#X} (stopped: {})", emulator.pc(), emulator.stopped());
    emulator.print_final_state();

    let exit_code = match stop_reason {
        StopReason::Shutdown => {
            info!("Guest requested shutdown");
            0
        }
        StopReason::Error(msg) => {
            eprintln!("Emulator error: {}", msg);
            2
        }
        StopReason::Timeout => {
            eprintln!("Timeout reached before stop conditions met");
            1
        }
        StopReason::StopCondition => match args.stop_pc {
            Some(expected) if !(emulator.stopped() && emulator.pc() == expected) => {
                // max_instructions was hit before the PC was reached
                eprintln!(
                    "CPU did not reach expected PC {:#X} (actual: {:#X}, stopped: {})",
                    expected,
                    emulator.pc(),
                    emulator.stopped()
                );
                1
            }
            Some(_) => {
                info!("PASS: stop PC reached");
                0
            }
            None => 0,
        },
    };

    std::process::exit(exit_code);
}
