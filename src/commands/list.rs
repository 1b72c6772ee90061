//! List commands implementation

use bsusb_core::{BoxManager, UsbDriver};

use crate::drivers;

/// Print the enumerated trigger boxes with their slot numbers
pub fn list_boxes<D: UsbDriver>(boxes: &BoxManager<D>) {
    let devices = boxes.devices();
    if devices.is_empty() {
        let config = boxes.config();
        println!(
            "No trigger boxes found ({:04x}:{:04x})",
            config.vendor_id, config.product_id
        );
        return;
    }

    let max_slots = boxes.config().max_slots;
    println!("{:<6} Device", "Slot");
    println!("{}", "-".repeat(60));
    for (slot, device) in devices.iter().enumerate() {
        if slot < max_slots {
            println!("{:<6} {}", slot, device);
        } else {
            println!("{:<6} {}", "-", device);
        }
    }
    if devices.len() > max_slots {
        println!();
        println!(
            "Only the first {} device(s) can be opened (raise with slots=<n>)",
            max_slots
        );
    }
}

/// List all compiled-in USB drivers
pub fn list_drivers() {
    print!("{}", drivers::driver_help());
}

/// List the parallel port back ends
pub fn list_ports() {
    println!("Parallel port back ends:");
    println!();
    for (name, description) in bsusb_parport::BACKENDS {
        println!("  {:8} - {}", name, description);
    }
}
