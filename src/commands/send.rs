//! Pseudo-random block test

use indicatif::{ProgressBar, ProgressStyle};

use bsusb_core::marker::snowplough;
use bsusb_core::{BoxManager, UsbDriver};
use bsusb_parport::ParallelPort;

use crate::drivers::parse_option_string;

const LCG_MULTIPLIER: u32 = 747_796_405;

/// Byte generator used by the block test
///
/// Each output byte is the wrapping sum of the four bytes of the state,
/// after which the state is multiplied by [`LCG_MULTIPLIER`].
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Start the generator at `seed`
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next output byte
    pub fn next_byte(&mut self) -> u8 {
        let s = self.state;
        self.state = s.wrapping_mul(LCG_MULTIPLIER);
        s.to_le_bytes()
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    /// Fill a new block of `length` bytes
    pub fn block(&mut self, length: usize) -> Vec<u8> {
        (0..length).map(|_| self.next_byte()).collect()
    }
}

/// Send `blocks` blocks of `length` generated bytes to `slot`
///
/// With a port, its data lines are raised to `0xFF` before each block and
/// dropped to `0x00` after it.
pub fn run_send<D: UsbDriver>(
    boxes: &mut BoxManager<D>,
    slot: usize,
    seed: u32,
    length: usize,
    blocks: usize,
    port: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = match port {
        Some(port) => {
            let (name, options) = parse_option_string(port);
            let port = bsusb_parport::open_port(name, &options)?;
            log::info!("Using parallel port {}", port.location());
            Some(port)
        }
        None => None,
    };

    boxes.open(slot)?;
    boxes.write_bytes(slot, &snowplough())?;

    let block = Lcg::new(seed).block(length);
    log::debug!("Block starts with {:02x?}", &block[..block.len().min(8)]);

    let pb = ProgressBar::new(blocks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")?
            .progress_chars("#>-"),
    );

    send_blocks(boxes, slot, &block, blocks, port.as_deref_mut(), &pb)?;
    pb.finish_and_clear();

    println!(
        "Sent {} block(s) of {} byte(s) to slot {}",
        blocks, length, slot
    );

    boxes.close(slot)?;
    if let Some(mut port) = port {
        port.release()?;
    }
    Ok(())
}

/// Write `block` to `slot` `blocks` times, framing each write with the port
///
/// The lines go back to `0x00` after every block, also when its write
/// failed.
fn send_blocks<D: UsbDriver, P: ParallelPort + ?Sized>(
    boxes: &mut BoxManager<D>,
    slot: usize,
    block: &[u8],
    blocks: usize,
    mut port: Option<&mut P>,
    pb: &ProgressBar,
) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..blocks {
        if let Some(port) = port.as_mut() {
            port.write_data(0xff)?;
        }
        let sent = boxes.write_bytes(slot, block);
        if let Some(port) = port.as_mut() {
            port.write_data(0x00)?;
        }
        sent?;
        pb.inc(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_first_byte() {
        let mut lcg = Lcg::new(0x0102_0304);
        assert_eq!(lcg.next_byte(), 10);
    }

    #[test]
    fn test_lcg_state_advances() {
        let mut lcg = Lcg::new(0x0102_0304);
        lcg.next_byte();
        let s = 0x0102_0304u32.wrapping_mul(LCG_MULTIPLIER);
        let expected = s.to_le_bytes().iter().fold(0u8, |a, b| a.wrapping_add(*b));
        assert_eq!(lcg.next_byte(), expected);
    }

    #[test]
    fn test_zero_seed_stays_zero() {
        assert_eq!(Lcg::new(0).block(16), vec![0; 16]);
    }

    #[test]
    fn test_block_is_reproducible() {
        assert_eq!(Lcg::new(7).block(64), Lcg::new(7).block(64));
        assert_ne!(Lcg::new(7).block(64), Lcg::new(8).block(64));
    }

    #[cfg(feature = "dummy")]
    mod blocks {
        use super::super::*;
        use bsusb_core::{BoxConfig, BoxError};
        use bsusb_dummy::{DummyBus, Faults};
        use bsusb_parport::DummyPort;

        fn open_box(bus: &DummyBus) -> BoxManager<bsusb_dummy::DummyDriver> {
            let mut boxes = BoxManager::new(bus.driver(), BoxConfig::default());
            boxes.find_all().unwrap();
            boxes.open(0).unwrap();
            boxes
        }

        #[test]
        fn test_send_blocks_strobes_port() {
            let bus = DummyBus::with_boxes(1);
            let mut boxes = open_box(&bus);
            let mut port = DummyPort::new();

            let pb = ProgressBar::hidden();
            send_blocks(&mut boxes, 0, &[1, 2, 3], 2, Some(&mut port), &pb).unwrap();

            assert_eq!(port.history(), [0xff, 0x00, 0xff, 0x00]);
            assert_eq!(bus.state(0).written(), [1, 2, 3, 1, 2, 3]);
        }

        #[test]
        fn test_failed_block_lowers_port() {
            let bus = DummyBus::with_boxes(1);
            let mut boxes = open_box(&bus);
            bus.set_faults(0, Faults::WRITE);
            let mut port = DummyPort::new();

            let pb = ProgressBar::hidden();
            let err = send_blocks(&mut boxes, 0, &[1, 2, 3], 3, Some(&mut port), &pb).unwrap_err();

            assert!(matches!(
                err.downcast_ref::<BoxError>(),
                Some(BoxError::Write { slot: 0, .. })
            ));
            assert_eq!(port.history(), [0xff, 0x00]);
            assert!(!boxes.is_open(0));
        }

        #[test]
        fn test_send_blocks_without_port() {
            let bus = DummyBus::with_boxes(1);
            let mut boxes = open_box(&bus);

            let pb = ProgressBar::hidden();
            send_blocks::<_, DummyPort>(&mut boxes, 0, &[7], 2, None, &pb).unwrap();
            assert_eq!(bus.state(0).written(), [7, 7]);
        }
    }
}
