//! Command implementations

mod list;
mod mark;
mod pins;
mod port;
mod send;
mod stream;

pub use list::{list_drivers, list_ports};
pub use port::{probe_port, pulse};

use crate::cli::BoxCommands;
use bsusb_core::{BoxManager, UsbDriver};

/// Run a trigger box command against `boxes`
///
/// Devices are enumerated first; every slot the command opened is closed
/// again before returning, also on failure.
pub fn run_box_command<D: UsbDriver>(
    boxes: &mut BoxManager<D>,
    command: BoxCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    boxes.find_all()?;

    let result = match command {
        BoxCommands::List => {
            list::list_boxes(boxes);
            Ok(())
        }
        BoxCommands::Send {
            slot,
            seed,
            length,
            blocks,
            port,
        } => send::run_send(boxes, slot, seed, length, blocks, port.as_deref()),
        BoxCommands::Stream { slot, length } => stream::run_stream(boxes, slot, length),
        BoxCommands::Pins { slot } => pins::run_pins(boxes, slot),
        BoxCommands::Mark {
            code,
            text,
            count,
            interval,
            record,
        } => mark::run_mark(boxes, code, &text, count, interval, record.as_deref()),
    };

    if let Err(e) = boxes.close_all() {
        log::warn!("{}", e);
    }
    result
}
