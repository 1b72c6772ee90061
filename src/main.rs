//! bsusb - BioSemi USB trigger interface tools
//!
//! Command line front end for the trigger box libraries:
//! - **Box commands** (list, send, stream, pins, mark) run against one USB
//!   driver, chosen with `--driver` and compiled in through features
//! - **Port commands** (pulse, probe-port, list-ports) drive a parallel
//!   port through one of the `bsusb-parport` back ends

mod cli;
mod commands;
mod drivers;

use bsusb_core::BoxError;
use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Boxes(command) => drivers::with_driver(&cli.driver, command),
        Commands::Pulse {
            port,
            high_us,
            low_us,
            count,
        } => commands::pulse(&port, high_us, low_us, count),
        Commands::ProbePort => commands::probe_port(),
        Commands::ListPorts => {
            commands::list_ports();
            Ok(())
        }
        Commands::ListDrivers => {
            commands::list_drivers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.downcast_ref::<BoxError>().and_then(BoxError::hint) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}
