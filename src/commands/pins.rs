//! Pin read command

use bsusb_core::{BoxManager, UsbDriver};

/// Open `slot` and print its data pin levels
pub fn run_pins<D: UsbDriver>(
    boxes: &mut BoxManager<D>,
    slot: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    boxes.open(slot)?;
    let pins = boxes.read_pins(slot)?;
    println!("Slot {}: pins 0x{:02x} ({:08b})", slot, pins, pins);
    boxes.close(slot)?;
    Ok(())
}
