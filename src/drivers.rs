//! USB driver registration and dispatch
//!
//! Every trigger box command runs against a [`BoxManager`] built for one
//! driver. The driver is chosen at runtime from the `--driver` string and
//! the matching back ends are compiled in through cargo features.

use crate::cli::BoxCommands;
use crate::commands;

#[allow(unused_imports)]
use bsusb_core::{BoxConfig, BoxManager};

/// Information about a USB driver
pub struct DriverInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all drivers enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_drivers() -> Vec<DriverInfo> {
    let mut drivers = Vec::new();

    #[cfg(feature = "ftdi")]
    drivers.push(DriverInfo {
        name: "ftdi",
        aliases: &["ft245", "usb"],
        description: "FT245BM trigger box over USB (vid=<hex>,pid=<hex>,timeout=<ms>,slots=<n>)",
    });

    #[cfg(feature = "dummy")]
    drivers.push(DriverInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated trigger boxes for testing (boxes=<n>,pins=<hex>,fail=<faults>)",
    });

    drivers
}

/// Generate help text listing all available drivers
pub fn driver_help() -> String {
    let drivers = available_drivers();

    if drivers.is_empty() {
        return "No drivers available (recompile with driver features enabled)".to_string();
    }

    let mut help = String::from("Available drivers:\n");
    for d in &drivers {
        help.push_str(&format!("  {:8} - {}\n", d.name, d.description));
        if !d.aliases.is_empty() {
            help.push_str(&format!("  {:8}   aliases: {}\n", "", d.aliases.join(", ")));
        }
    }
    help
}

/// Generate a short list of driver names for CLI help
pub fn driver_names_short() -> String {
    let drivers = available_drivers();
    let names: Vec<&str> = drivers.iter().map(|d| d.name).collect();
    names.join(", ")
}

/// Resolve a driver name or alias to its primary name
pub fn find_driver(name: &str) -> Option<&'static str> {
    available_drivers()
        .into_iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
        .map(|d| d.name)
}

/// Run a trigger box command with the driver described by `driver`
///
/// The driver string can be just the name (e.g. "ftdi") or include
/// options (e.g. "dummy:boxes=2,fail=write").
pub fn with_driver(driver: &str, command: BoxCommands) -> Result<(), Box<dyn std::error::Error>> {
    let (name, options) = parse_option_string(driver);

    let canonical_name = match find_driver(name) {
        Some(n) => n,
        None => return Err(unknown_driver_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "ftdi")]
        "ftdi" => {
            let config = BoxConfig::parse_options(&options)
                .map_err(|e| format!("Invalid ftdi parameters: {}", e))?;
            let mut boxes = BoxManager::new(bsusb_ftdi::Ft245Driver::new(), config);
            commands::run_box_command(&mut boxes, command)
        }

        #[cfg(feature = "dummy")]
        "dummy" => {
            use bsusb_dummy::{DummyBus, DummyConfig};

            let (bus_options, box_options): (Vec<_>, Vec<_>) = options
                .iter()
                .copied()
                .partition(|(k, _)| matches!(*k, "boxes" | "pins" | "fail"));

            let bus_config = DummyConfig::parse_options(&bus_options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            let config = BoxConfig::parse_options(&box_options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;

            log::info!("Using {} emulated trigger box(es)", bus_config.boxes);
            let bus = DummyBus::new(bus_config);
            let mut boxes = BoxManager::new(bus.driver(), config);
            commands::run_box_command(&mut boxes, command)
        }

        _ => {
            let _ = (options, command);
            Err(unknown_driver_error(name))
        }
    }
}

/// Parse a driver or port string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_option_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_driver_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown driver: {}\n\n", name);
    msg.push_str(&driver_help());
    msg.push_str("\nUse 'bsusb list-drivers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option_string() {
        assert_eq!(parse_option_string("ftdi"), ("ftdi", vec![]));
        assert_eq!(
            parse_option_string("dummy:boxes=2,fail=write"),
            ("dummy", vec![("boxes", "2"), ("fail", "write")])
        );
        assert_eq!(
            parse_option_string("ppdev:dev=/dev/parport1,junk"),
            ("ppdev", vec![("dev", "/dev/parport1")])
        );
    }

    #[test]
    fn test_unknown_driver() {
        let err = with_driver("serial", BoxCommands::List).unwrap_err();
        assert!(err.to_string().starts_with("Unknown driver: serial"));
    }

    #[cfg(feature = "ftdi")]
    #[test]
    fn test_find_driver_alias() {
        assert_eq!(find_driver("ft245"), Some("ftdi"));
        assert_eq!(find_driver("ftdi"), Some("ftdi"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_driver_runs_commands() {
        with_driver("dummy:boxes=2", BoxCommands::List).unwrap();
        with_driver("dummy", BoxCommands::Pins { slot: 0 }).unwrap();
        with_driver(
            "dummy",
            BoxCommands::Stream {
                slot: 0,
                length: 1000,
            },
        )
        .unwrap();
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_driver_reports_failures() {
        let err = with_driver("dummy:fail=write", BoxCommands::Stream { slot: 0, length: 8 })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<bsusb_core::BoxError>(),
            Some(bsusb_core::BoxError::Write { slot: 0, .. })
        ));

        let err = with_driver("dummy:boxes=0", BoxCommands::Pins { slot: 0 }).unwrap_err();
        assert!(err.downcast_ref::<bsusb_core::BoxError>().is_some());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_invalid_options() {
        let err = with_driver("dummy:boxes=many", BoxCommands::List).unwrap_err();
        assert!(err.to_string().starts_with("Invalid dummy parameters"));
    }
}
