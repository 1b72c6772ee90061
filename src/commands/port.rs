//! Parallel port commands

use std::thread;
use std::time::Duration;

use bsusb_parport::ParallelPort;

use crate::drivers::parse_option_string;

/// Toggle the data lines of the port described by `port`
///
/// Runs `count` high/low cycles, or forever when `count` is 0. The lines
/// are left low and the port is released afterwards.
pub fn pulse(
    port: &str,
    high_us: u64,
    low_us: u64,
    count: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (name, options) = parse_option_string(port);
    let mut port = bsusb_parport::open_port(name, &options)?;
    log::info!("Pulsing parallel port {}", port.location());

    let cycles = pulse_cycles(&mut port, high_us, low_us, count)?;
    port.release()?;

    println!("{} pulse(s) on {}", cycles, port.location());
    Ok(())
}

fn pulse_cycles<P: ParallelPort + ?Sized>(
    port: &mut P,
    high_us: u64,
    low_us: u64,
    count: u64,
) -> bsusb_parport::Result<u64> {
    let high = Duration::from_micros(high_us);
    let low = Duration::from_micros(low_us);

    let mut cycles = 0;
    while count == 0 || cycles < count {
        port.write_data(0xff)?;
        thread::sleep(high);
        port.write_data(0x00)?;
        thread::sleep(low);
        cycles += 1;
    }
    Ok(cycles)
}

/// Probe the legacy LPT addresses and print the first that responds
#[cfg(unix)]
pub fn probe_port() -> Result<(), Box<dyn std::error::Error>> {
    use bsusb_parport::direct::DevPort;
    use bsusb_parport::{autodetect, CANDIDATE_BASES};

    let mut io = DevPort::open()?;
    match autodetect(&mut io, &CANDIDATE_BASES)? {
        Some(base) => println!("Parallel port found at 0x{:03x}", base),
        None => println!("No parallel port found"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn probe_port() -> Result<(), Box<dyn std::error::Error>> {
    Err(bsusb_parport::ParportError::Unsupported("direct").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsusb_parport::DummyPort;

    #[test]
    fn test_pulse_cycles() {
        let mut port = DummyPort::new();
        assert_eq!(pulse_cycles(&mut port, 0, 0, 3).unwrap(), 3);
        assert_eq!(port.history(), [0xff, 0x00, 0xff, 0x00, 0xff, 0x00]);
    }

    #[test]
    fn test_pulse_released_port() {
        let mut port = DummyPort::new();
        port.release().unwrap();
        assert!(pulse_cycles(&mut port, 0, 0, 1).is_err());
    }

    #[test]
    fn test_pulse_dummy_backend() {
        pulse("dummy", 0, 0, 2).unwrap();
        assert!(pulse("lpt9", 0, 0, 1).is_err());
    }
}
