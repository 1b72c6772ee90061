//! bsusb-dummy - In-memory trigger box emulator for testing
//!
//! This crate provides a USB driver that emulates any number of trigger
//! boxes in memory. Every operation a context performs is recorded per box,
//! and failures can be injected per box and per operation, so the slot
//! table's cleanup paths can be exercised without hardware.
//!
//! The emulated bus is shared: keep a [`DummyBus`] handle to inspect the
//! boxes while a [`BoxManager`](bsusb_core::BoxManager) owns the driver.
//!
//! ```ignore
//! let bus = DummyBus::with_boxes(2);
//! let mut boxes = BoxManager::new(bus.driver(), BoxConfig::default());
//! boxes.find_all()?;
//! boxes.open(1)?;
//! boxes.write_byte(1, 0x42)?;
//! assert_eq!(bus.state(1).written(), [0x42]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bitflags::bitflags;
use bsusb_core::error::{BoxError, DriverError, DriverErrorKind};
use bsusb_core::protocol::{BIOSEMI_PRODUCT_ID, BIOSEMI_VENDOR_ID};
use bsusb_core::{BitMode, BoxConfig, ControlRequest, DeviceDescriptor, UsbContext, UsbDriver};

bitflags! {
    /// Operations that fail on purpose
    ///
    /// `ENUMERATE` and `INIT` apply to the whole bus, the rest to a box.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Faults: u16 {
        /// Bus scan
        const ENUMERATE = 1 << 0;
        /// Context creation
        const INIT = 1 << 1;
        /// Device open
        const OPEN = 1 << 2;
        /// SIO reset
        const RESET = 1 << 3;
        /// Bitmode change
        const BITMODE = 1 << 4;
        /// FIFO write
        const WRITE = 1 << 5;
        /// Pin read
        const READ_PINS = 1 << 6;
        /// Control request
        const CONTROL = 1 << 7;
        /// Device close
        const CLOSE = 1 << 8;
    }
}

impl Faults {
    /// Parse a `+`-separated list of fault names, e.g. `write+close`
    pub fn parse(s: &str) -> Option<Self> {
        let mut faults = Faults::empty();
        for name in s.split('+').filter(|n| !n.is_empty()) {
            let name = name.to_ascii_uppercase().replace('-', "_");
            faults |= Faults::from_name(&name)?;
        }
        Some(faults)
    }
}

/// Configuration for the emulated bus
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Number of attached boxes
    pub boxes: usize,
    /// Pin state reported by every box
    pub pins: u8,
    /// Faults injected into every box and the bus
    pub faults: Faults,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            boxes: 1,
            pins: 0x00,
            faults: Faults::empty(),
        }
    }
}

impl DummyConfig {
    /// Build a configuration from `key=value` options (`boxes`, `pins`, `fail`)
    pub fn parse_options(options: &[(&str, &str)]) -> Result<Self, BoxError> {
        let mut config = DummyConfig::default();

        for (key, value) in options {
            match *key {
                "boxes" => {
                    config.boxes = value.parse().map_err(|_| {
                        BoxError::InvalidParameter(format!("Invalid box count '{}'", value))
                    })?;
                }
                "pins" => {
                    let v = value.trim_start_matches("0x");
                    config.pins = u8::from_str_radix(v, 16).map_err(|_| {
                        BoxError::InvalidParameter(format!("Invalid pin state '{}'", value))
                    })?;
                }
                "fail" => {
                    config.faults = Faults::parse(value).ok_or_else(|| {
                        BoxError::InvalidParameter(format!(
                            "Invalid fault list '{}'. Valid faults: enumerate, init, open, \
                             reset, bitmode, write, read-pins, control, close",
                            value
                        ))
                    })?;
                }
                _ => {
                    log::warn!("Unknown dummy option: {}={}", key, value);
                }
            }
        }

        Ok(config)
    }
}

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyEvent {
    /// Device opened
    Open,
    /// SIO reset
    Reset,
    /// Bitmode changed
    SetBitmode {
        /// Output mask
        mask: u8,
        /// New mode
        mode: BitMode,
    },
    /// Bytes written to the FIFO
    Write(Vec<u8>),
    /// Pins read
    ReadPins,
    /// Control request issued
    Control(ControlRequest),
    /// Device closed
    Close,
}

/// State of one emulated box
#[derive(Debug, Clone)]
pub struct DummyBoxState {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Serial number string
    pub serial: String,
    /// Pin state returned by pin reads
    pub pins: u8,
    /// Injected faults
    pub faults: Faults,
    /// Whether the box is plugged in
    pub present: bool,
    /// Whether a context has the box open
    pub opened: bool,
    /// Last mode applied
    pub mode: Option<BitMode>,
    /// Write timeout of the context that opened the box
    pub timeout: Option<Duration>,
    /// Everything done to the box, oldest first
    pub events: Vec<DummyEvent>,
}

impl DummyBoxState {
    fn new(index: usize, config: &DummyConfig) -> Self {
        Self {
            vendor_id: BIOSEMI_VENDOR_ID,
            product_id: BIOSEMI_PRODUCT_ID,
            serial: format!("DUMMY{:03}", index),
            pins: config.pins,
            faults: config.faults,
            present: true,
            opened: false,
            mode: None,
            timeout: None,
            events: Vec::new(),
        }
    }

    /// All bytes written to the FIFO, concatenated
    pub fn written(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DummyEvent::Write(data) => Some(data.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// All control requests issued
    pub fn controls(&self) -> Vec<ControlRequest> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DummyEvent::Control(request) => Some(*request),
                _ => None,
            })
            .collect()
    }
}

struct Shared {
    boxes: Vec<DummyBoxState>,
    faults: Faults,
}

/// Handle to the emulated bus
#[derive(Clone)]
pub struct DummyBus {
    shared: Arc<Mutex<Shared>>,
}

impl DummyBus {
    /// Create a bus from a configuration
    pub fn new(config: DummyConfig) -> Self {
        let boxes = (0..config.boxes)
            .map(|i| DummyBoxState::new(i, &config))
            .collect();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                boxes,
                faults: config.faults & (Faults::ENUMERATE | Faults::INIT),
            })),
        }
    }

    /// Create a bus with `count` healthy boxes
    pub fn with_boxes(count: usize) -> Self {
        Self::new(DummyConfig {
            boxes: count,
            ..DummyConfig::default()
        })
    }

    /// A driver operating on this bus
    pub fn driver(&self) -> DummyDriver {
        DummyDriver { bus: self.clone() }
    }

    /// Number of boxes ever attached
    pub fn len(&self) -> usize {
        self.lock().boxes.len()
    }

    /// Whether no box was ever attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plug in another box, returning its index
    pub fn attach(&self) -> usize {
        let mut shared = self.lock();
        let index = shared.boxes.len();
        let state = DummyBoxState::new(index, &DummyConfig::default());
        shared.boxes.push(state);
        index
    }

    /// Unplug box `index`; open contexts start failing with `Disconnected`
    pub fn detach(&self, index: usize) {
        if let Some(state) = self.lock().boxes.get_mut(index) {
            state.present = false;
        }
    }

    /// Replace the faults of box `index`
    pub fn set_faults(&self, index: usize, faults: Faults) {
        if let Some(state) = self.lock().boxes.get_mut(index) {
            state.faults = faults;
        }
    }

    /// Replace the bus-level faults
    pub fn set_bus_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Set the pin state of box `index`
    pub fn set_pins(&self, index: usize, pins: u8) {
        if let Some(state) = self.lock().boxes.get_mut(index) {
            state.pins = pins;
        }
    }

    /// Snapshot of box `index`
    ///
    /// # Panics
    ///
    /// Panics if no box with that index was ever attached.
    pub fn state(&self, index: usize) -> DummyBoxState {
        self.lock().boxes[index].clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DummyBus {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

/// Driver for the emulated bus
pub struct DummyDriver {
    bus: DummyBus,
}

impl UsbDriver for DummyDriver {
    type Device = usize;
    type Context = DummyContext;

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn find_all(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<usize>, DriverError> {
        let shared = self.bus.lock();
        if shared.faults.contains(Faults::ENUMERATE) {
            return Err(injected("enumerate"));
        }
        Ok(shared
            .boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.present && b.vendor_id == vendor_id && b.product_id == product_id)
            .map(|(i, _)| i)
            .collect())
    }

    fn describe(&self, device: &usize) -> DeviceDescriptor {
        let shared = self.bus.lock();
        let state = shared.boxes.get(*device);
        DeviceDescriptor {
            bus_id: "dummy".into(),
            address: (*device + 1) as u8,
            vendor_id: state.map_or(BIOSEMI_VENDOR_ID, |s| s.vendor_id),
            product_id: state.map_or(BIOSEMI_PRODUCT_ID, |s| s.product_id),
            serial: state.map(|s| s.serial.clone()),
            product: Some("Dummy Trigger Interface".into()),
        }
    }

    fn new_context(&mut self, config: &BoxConfig) -> Result<DummyContext, DriverError> {
        if self.bus.lock().faults.contains(Faults::INIT) {
            return Err(injected("init"));
        }
        Ok(DummyContext {
            bus: self.bus.clone(),
            index: None,
            timeout: config.write_timeout,
        })
    }
}

/// Context for one emulated box
pub struct DummyContext {
    bus: DummyBus,
    index: Option<usize>,
    timeout: Duration,
}

impl DummyContext {
    /// Run `f` on the open box unless it is gone or `fault` is injected
    fn with_box<T>(
        &mut self,
        fault: Faults,
        name: &str,
        f: impl FnOnce(&mut DummyBoxState) -> T,
    ) -> Result<T, DriverError> {
        let index = self.index.ok_or_else(DriverError::not_open)?;
        let mut shared = self.bus.lock();
        let state = &mut shared.boxes[index];
        if !state.present {
            return Err(DriverError::new(
                DriverErrorKind::Disconnected,
                "box unplugged",
            ));
        }
        if state.faults.contains(fault) {
            return Err(injected(name));
        }
        Ok(f(state))
    }
}

impl UsbContext for DummyContext {
    type Device = usize;

    fn open(&mut self, device: &usize) -> Result<(), DriverError> {
        let mut shared = self.bus.lock();
        let state = shared
            .boxes
            .get_mut(*device)
            .ok_or_else(|| DriverError::new(DriverErrorKind::NotFound, "no such box"))?;
        if !state.present {
            return Err(DriverError::new(
                DriverErrorKind::Disconnected,
                "box unplugged",
            ));
        }
        if state.faults.contains(Faults::OPEN) {
            return Err(injected("open"));
        }
        if state.opened {
            return Err(DriverError::new(DriverErrorKind::Busy, "box already open"));
        }
        state.opened = true;
        state.timeout = Some(self.timeout);
        state.events.push(DummyEvent::Open);
        self.index = Some(*device);
        log::debug!("dummy: opened box {}", device);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        self.with_box(Faults::RESET, "reset", |s| s.events.push(DummyEvent::Reset))
    }

    fn set_bitmode(&mut self, mask: u8, mode: BitMode) -> Result<(), DriverError> {
        self.with_box(Faults::BITMODE, "bitmode", |s| {
            s.mode = Some(mode);
            s.events.push(DummyEvent::SetBitmode { mask, mode });
        })
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, DriverError> {
        self.with_box(Faults::WRITE, "write", |s| {
            s.events.push(DummyEvent::Write(data.to_vec()));
            data.len()
        })
    }

    fn read_pins(&mut self) -> Result<u8, DriverError> {
        self.with_box(Faults::READ_PINS, "read pins", |s| {
            s.events.push(DummyEvent::ReadPins);
            s.pins
        })
    }

    fn control(&mut self, request: &ControlRequest) -> Result<usize, DriverError> {
        self.with_box(Faults::CONTROL, "control", |s| {
            s.events.push(DummyEvent::Control(*request));
            0
        })
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let index = self.index.take().ok_or_else(DriverError::not_open)?;
        let mut shared = self.bus.lock();
        let state = &mut shared.boxes[index];
        state.opened = false;
        state.events.push(DummyEvent::Close);
        log::debug!("dummy: closed box {}", index);
        if state.faults.contains(Faults::CLOSE) {
            return Err(injected("close"));
        }
        Ok(())
    }
}

impl Drop for DummyContext {
    fn drop(&mut self) {
        if let Some(index) = self.index.take() {
            self.bus.lock().boxes[index].opened = false;
        }
    }
}

fn injected(operation: &str) -> DriverError {
    DriverError::other(format!("injected {} failure", operation))
}
