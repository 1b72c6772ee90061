//! Slot table
//!
//! [`BoxManager`] owns a USB driver, the device list from the last
//! enumeration, and one context per open slot. Slots are addressed by the
//! position of the device in the enumerated list.
//!
//! Lifecycle of a slot: `open` creates a context, opens the device, resets
//! it and switches bitbang off. Any step failing tears down what was
//! acquired and leaves the slot closed. A failing write or pin read closes
//! the slot before the error is returned; the caller has to re-open it.

use std::collections::BTreeMap;

use crate::config::BoxConfig;
use crate::driver::{BitMode, ControlRequest, DeviceDescriptor, UsbContext, UsbDriver};
use crate::error::{BoxError, Result};

/// Mode every slot is left in by `open`
const OPEN_MODE: BitMode = BitMode::Reset;

/// Owned table of open trigger boxes
pub struct BoxManager<D: UsbDriver> {
    driver: D,
    config: BoxConfig,
    devices: Option<Vec<D::Device>>,
    slots: BTreeMap<usize, D::Context>,
}

impl<D: UsbDriver> BoxManager<D> {
    /// Create a manager with an empty slot table
    pub fn new(driver: D, config: BoxConfig) -> Self {
        Self {
            driver,
            config,
            devices: None,
            slots: BTreeMap::new(),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &BoxConfig {
        &self.config
    }

    /// The driver back end
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Scan the bus and retain the device list for later opens.
    ///
    /// Replaces any previously retained list. Slots that are already open
    /// keep their contexts.
    pub fn find_all(&mut self) -> Result<usize> {
        let devices = self
            .driver
            .find_all(self.config.vendor_id, self.config.product_id)
            .map_err(|source| BoxError::Enumeration { source })?;

        log::info!(
            "Found {} trigger box(es) ({:04x}:{:04x}) via {}",
            devices.len(),
            self.config.vendor_id,
            self.config.product_id,
            self.driver.name()
        );
        for (index, device) in devices.iter().enumerate() {
            log::debug!("  [{}] {}", index, self.driver.describe(device));
        }

        let count = devices.len();
        self.devices = Some(devices);
        Ok(count)
    }

    /// Number of devices found by the last enumeration
    pub fn device_count(&self) -> Option<usize> {
        self.devices.as_ref().map(Vec::len)
    }

    /// Descriptors of the retained device list
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .iter()
            .flatten()
            .map(|d| self.driver.describe(d))
            .collect()
    }

    /// Open the device at position `slot` of the enumerated list
    pub fn open(&mut self, slot: usize) -> Result<()> {
        let devices = self.devices.as_ref().ok_or(BoxError::NotEnumerated)?;
        if slot >= devices.len() || slot >= self.config.max_slots {
            return Err(BoxError::SlotOutOfRange {
                slot,
                count: devices.len(),
                max_slots: self.config.max_slots,
            });
        }
        if self.slots.contains_key(&slot) {
            return Err(BoxError::SlotBusy { slot });
        }

        let device = &devices[slot];
        log::debug!("Opening slot {}: {}", slot, self.driver.describe(device));

        let mut context = self
            .driver
            .new_context(&self.config)
            .map_err(|source| BoxError::DriverInit { slot, source })?;

        context
            .open(device)
            .map_err(|source| BoxError::Open { slot, source })?;

        if let Err(source) = context.reset() {
            discard(slot, &mut context);
            return Err(BoxError::Reset { slot, source });
        }

        if let Err(source) = context.set_bitmode(0x00, OPEN_MODE) {
            discard(slot, &mut context);
            return Err(BoxError::Bitmode { slot, source });
        }

        log::info!("Opened trigger box in slot {}", slot);
        self.slots.insert(slot, context);
        Ok(())
    }

    /// Open every enumerated device that fits in the slot table.
    ///
    /// Returns the number of slots opened. If one of them fails, the slots
    /// opened by this call are closed again.
    pub fn open_all(&mut self) -> Result<usize> {
        let count = self.device_count().ok_or(BoxError::NotEnumerated)?;
        if count == 0 {
            return Err(BoxError::NoDevices {
                vendor_id: self.config.vendor_id,
                product_id: self.config.product_id,
            });
        }

        let mut opened = Vec::new();
        for slot in 0..count.min(self.config.max_slots) {
            if self.is_open(slot) {
                continue;
            }
            if let Err(e) = self.open(slot) {
                for slot in opened {
                    self.force_close(slot);
                }
                return Err(e);
            }
            opened.push(slot);
        }
        Ok(opened.len())
    }

    /// Write `data` to the box in `slot`.
    ///
    /// On failure the slot is closed before the error is returned.
    pub fn write_bytes(&mut self, slot: usize, data: &[u8]) -> Result<usize> {
        let context = self.slot_mut(slot)?;
        match context.write(data) {
            Ok(written) => {
                log::trace!("Slot {}: wrote {} bytes", slot, written);
                Ok(written)
            }
            Err(source) => {
                self.force_close(slot);
                Err(BoxError::Write { slot, source })
            }
        }
    }

    /// Write a single byte to the box in `slot`
    pub fn write_byte(&mut self, slot: usize, byte: u8) -> Result<usize> {
        self.write_bytes(slot, &[byte])
    }

    /// Read the pin state of the box in `slot`.
    ///
    /// On failure the slot is closed before the error is returned.
    pub fn read_pins(&mut self, slot: usize) -> Result<u8> {
        let context = self.slot_mut(slot)?;
        match context.read_pins() {
            Ok(pins) => {
                log::trace!("Slot {}: pins 0x{:02x}", slot, pins);
                Ok(pins)
            }
            Err(source) => {
                self.force_close(slot);
                Err(BoxError::ReadPins { slot, source })
            }
        }
    }

    /// Issue a control request without data stage to the box in `slot`.
    ///
    /// A failure is reported but leaves the slot open.
    pub fn send_control(&mut self, slot: usize, request: ControlRequest) -> Result<usize> {
        let context = self.slot_mut(slot)?;
        log::trace!("Slot {}: control {}", slot, request);
        context
            .control(&request)
            .map_err(|source| BoxError::Control { slot, source })
    }

    /// Close the box in `slot`.
    ///
    /// The context is released even when the driver reports a failure.
    pub fn close(&mut self, slot: usize) -> Result<()> {
        let mut context = self
            .slots
            .remove(&slot)
            .ok_or(BoxError::SlotClosed { slot })?;
        context
            .close()
            .map_err(|source| BoxError::Close { slot, source })?;
        log::info!("Closed slot {}", slot);
        Ok(())
    }

    /// Close every open slot, returning the first failure
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for slot in self.open_slots() {
            if let Err(e) = self.close(slot) {
                log::warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Whether `slot` holds an open device
    pub fn is_open(&self, slot: usize) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Open slots in ascending order
    pub fn open_slots(&self) -> Vec<usize> {
        self.slots.keys().copied().collect()
    }

    /// I/O mode of the open device in `slot`
    ///
    /// `open` leaves every device in FIFO mode and nothing changes it
    /// afterwards, so this is `Some(BitMode::Reset)` for every open slot.
    pub fn mode(&self, slot: usize) -> Option<BitMode> {
        self.is_open(slot).then_some(OPEN_MODE)
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut D::Context> {
        self.slots
            .get_mut(&slot)
            .ok_or(BoxError::SlotClosed { slot })
    }

    fn force_close(&mut self, slot: usize) {
        if let Some(mut context) = self.slots.remove(&slot) {
            discard(slot, &mut context);
            log::warn!("Slot {} closed after I/O failure", slot);
        }
    }
}

impl<D: UsbDriver> Drop for BoxManager<D> {
    fn drop(&mut self) {
        for (slot, context) in self.slots.iter_mut() {
            discard(*slot, context);
        }
    }
}

/// Close a context whose failure would only mask the error being reported
fn discard<C: UsbContext>(slot: usize, context: &mut C) {
    if let Err(e) = context.close() {
        log::warn!("Failed to close device in slot {}: {}", slot, e);
    }
}
