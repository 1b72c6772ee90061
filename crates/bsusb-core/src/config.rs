//! Trigger box configuration

use std::time::Duration;

use crate::error::{BoxError, Result};
use crate::protocol::{BIOSEMI_PRODUCT_ID, BIOSEMI_VENDOR_ID, DEFAULT_WRITE_TIMEOUT, MAX_SLOTS};

/// Settings shared by every slot of a [`BoxManager`](crate::BoxManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxConfig {
    /// Vendor ID to enumerate
    pub vendor_id: u16,
    /// Product ID to enumerate
    pub product_id: u16,
    /// Timeout applied to every write, fixed when a slot is opened
    pub write_timeout: Duration,
    /// Capacity of the slot table
    pub max_slots: usize,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            vendor_id: BIOSEMI_VENDOR_ID,
            product_id: BIOSEMI_PRODUCT_ID,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_slots: MAX_SLOTS,
        }
    }
}

impl BoxConfig {
    /// Create a configuration for the BioSemi identification pair
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the identification pair
    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the slot table capacity
    pub fn with_max_slots(mut self, max_slots: usize) -> Result<Self> {
        if max_slots == 0 {
            return Err(BoxError::InvalidParameter(
                "slot table needs at least one slot".into(),
            ));
        }
        self.max_slots = max_slots;
        Ok(self)
    }

    /// Build a configuration from `key=value` options.
    ///
    /// Recognized keys: `vid`, `pid` (hex, optional `0x`), `timeout`
    /// (milliseconds) and `slots`. Unknown keys are logged and ignored.
    pub fn parse_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut config = BoxConfig::default();

        for (key, value) in options {
            match *key {
                "vid" => {
                    config.vendor_id = parse_hex_u16(value).ok_or_else(|| {
                        BoxError::InvalidParameter(format!("Invalid vendor ID '{}'", value))
                    })?;
                }
                "pid" => {
                    config.product_id = parse_hex_u16(value).ok_or_else(|| {
                        BoxError::InvalidParameter(format!("Invalid product ID '{}'", value))
                    })?;
                }
                "timeout" => {
                    let ms: u64 = value.parse().map_err(|_| {
                        BoxError::InvalidParameter(format!("Invalid timeout '{}'", value))
                    })?;
                    config.write_timeout = Duration::from_millis(ms);
                }
                "slots" => {
                    let slots: usize = value.parse().map_err(|_| {
                        BoxError::InvalidParameter(format!("Invalid slot count '{}'", value))
                    })?;
                    config = config.with_max_slots(slots)?;
                }
                _ => {
                    log::warn!("Unknown trigger box option: {}={}", key, value);
                }
            }
        }

        Ok(config)
    }
}

fn parse_hex_u16(s: &str) -> Option<u16> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoxConfig::default();
        assert_eq!(config.vendor_id, 0x1305);
        assert_eq!(config.product_id, 0x1979);
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.max_slots, 5);
    }

    #[test]
    fn test_parse_options() {
        let config = BoxConfig::parse_options(&[
            ("vid", "0x0403"),
            ("pid", "6001"),
            ("timeout", "250"),
            ("slots", "2"),
            ("color", "blue"),
        ])
        .unwrap();
        assert_eq!(config.vendor_id, 0x0403);
        assert_eq!(config.product_id, 0x6001);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.max_slots, 2);
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(BoxConfig::parse_options(&[("vid", "xyz")]).is_err());
        assert!(BoxConfig::parse_options(&[("timeout", "-1")]).is_err());
        assert!(matches!(
            BoxConfig::parse_options(&[("slots", "0")]),
            Err(BoxError::InvalidParameter(_))
        ));
    }
}
