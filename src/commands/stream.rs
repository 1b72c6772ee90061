//! Write throughput test

use std::time::{Duration, Instant};

use bsusb_core::{BoxManager, UsbDriver};

/// Test pattern: byte `i` is `i % 256`
pub fn pattern(length: usize) -> Vec<u8> {
    (0..length).map(|i| i as u8).collect()
}

/// Format a throughput line
pub fn format_throughput(bytes: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        bytes as f64 / 1024.0 / secs
    } else {
        0.0
    };
    format!("{} bytes in {:.3} sec ({:.3} kb/s)", bytes, secs, rate)
}

/// Write `length` pattern bytes to `slot` and report the throughput
pub fn run_stream<D: UsbDriver>(
    boxes: &mut BoxManager<D>,
    slot: usize,
    length: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    boxes.open(slot)?;
    let data = pattern(length);

    log::info!("Writing {} bytes to slot {}", length, slot);
    let start = Instant::now();
    let written = boxes.write_bytes(slot, &data)?;
    let elapsed = start.elapsed();

    println!("{}", format_throughput(written, elapsed));
    boxes.close(slot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_wraps() {
        let data = pattern(300);
        assert_eq!(data[0], 0);
        assert_eq!(data[255], 255);
        assert_eq!(data[256], 0);
        assert_eq!(data[299], 43);
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(
            format_throughput(4096, Duration::from_millis(500)),
            "4096 bytes in 0.500 sec (8.000 kb/s)"
        );
        assert_eq!(
            format_throughput(0, Duration::ZERO),
            "0 bytes in 0.000 sec (0.000 kb/s)"
        );
    }
}
