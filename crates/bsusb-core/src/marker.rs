//! Event markers
//!
//! The acquisition software splits the trigger stream into chunks. The
//! first byte of a chunk is a code with the top bit set; everything after
//! it is payload with the top bit clear:
//!
//! | Byte        | Meaning                                   |
//! |-------------|-------------------------------------------|
//! | `128..160`  | stimulus 0..31                            |
//! | `160..192`  | target stimulus 0..31                     |
//! | `192..224`  | control code 0..31 (192 start of run, 193 end of run, 223 chunk) |
//! | `0..128`    | payload                                   |
//!
//! Every chunk is preceded by a TX purge request, which pulses TXE on the
//! FT245BM. The recorder latches that pulse as the marker time with half a
//! sample period of resolution.

use std::fmt;
use std::io::Write;
use std::time::Instant;

use crate::driver::UsbDriver;
use crate::error::{BoxError, Result};
use crate::protocol::{MARKER_STROBE, SNOWPLOUGH_LEN};
use crate::slots::BoxManager;

const STIMULUS_BASE: u8 = 128;
const TARGET_FLAG: u8 = 32;
const CONTROL_BASE: u8 = 192;
const CODE_END: u8 = 224;
const PAYLOAD_LIMIT: u8 = 128;

/// First byte of a marker chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerCode(u8);

impl MarkerCode {
    /// Start of run
    pub const START_OF_RUN: MarkerCode = MarkerCode(CONTROL_BASE);
    /// End of run
    pub const END_OF_RUN: MarkerCode = MarkerCode(CONTROL_BASE + 1);
    /// Unspecified chunk of data
    pub const CHUNK: MarkerCode = MarkerCode(CONTROL_BASE + 31);

    /// Stimulus `n` (0..32), flagged as target if requested
    pub fn stimulus(n: u8, target: bool) -> Result<Self> {
        if n >= TARGET_FLAG {
            return Err(BoxError::InvalidMarker(format!(
                "stimulus {} out of range (0..32)",
                n
            )));
        }
        let flag = if target { TARGET_FLAG } else { 0 };
        Ok(MarkerCode(STIMULUS_BASE + flag + n))
    }

    /// Control code `n` (0..32)
    pub fn control(n: u8) -> Result<Self> {
        if n >= 32 {
            return Err(BoxError::InvalidMarker(format!(
                "control code {} out of range (0..32)",
                n
            )));
        }
        Ok(MarkerCode(CONTROL_BASE + n))
    }

    /// Validate a raw code byte
    pub fn from_raw(raw: u8) -> Result<Self> {
        if !(STIMULUS_BASE..CODE_END).contains(&raw) {
            return Err(BoxError::InvalidMarker(format!(
                "code {} outside 128..224",
                raw
            )));
        }
        Ok(MarkerCode(raw))
    }

    /// The code byte
    pub fn as_raw(self) -> u8 {
        self.0
    }

    /// Whether this is a stimulus code
    pub fn is_stimulus(self) -> bool {
        self.0 < CONTROL_BASE
    }

    /// Whether this is a target stimulus code
    pub fn is_target(self) -> bool {
        self.is_stimulus() && self.0 & TARGET_FLAG != 0
    }
}

impl Default for MarkerCode {
    fn default() -> Self {
        MarkerCode::CHUNK
    }
}

impl fmt::Display for MarkerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build a chunk: `code` followed by `payload`.
///
/// Without a code the payload is sent alone, continuing the previous chunk.
pub fn frame(code: Option<MarkerCode>, payload: &[u8]) -> Result<Vec<u8>> {
    if let Some(pos) = payload.iter().position(|&b| b >= PAYLOAD_LIMIT) {
        return Err(BoxError::InvalidMarker(format!(
            "payload byte {} at offset {} has the top bit set",
            payload[pos], pos
        )));
    }

    let mut chunk = Vec::with_capacity(payload.len() + 1);
    if let Some(code) = code {
        chunk.push(code.as_raw());
    }
    chunk.extend_from_slice(payload);
    Ok(chunk)
}

/// The zero packet flushing the receiver after a box is opened
pub fn snowplough() -> Vec<u8> {
    vec![0u8; SNOWPLOUGH_LEN]
}

/// Destination for event markers
pub trait MarkerSink {
    /// Prepare the sink before the first marker
    fn prime(&mut self) -> Result<()>;

    /// Send one chunk
    fn send(&mut self, code: Option<MarkerCode>, payload: &[u8]) -> Result<()>;

    /// Release the sink
    fn finish(&mut self) -> Result<()>;
}

/// Sends markers to a set of boxes at once
///
/// Slots that are already open when the sink is primed are used as they
/// are and stay open after [`finish`](MarkerSink::finish); only slots the
/// sink opened itself are closed again.
pub struct UsbMarkers<'a, D: UsbDriver> {
    boxes: &'a mut BoxManager<D>,
    slots: Vec<usize>,
    opened: Vec<usize>,
}

impl<'a, D: UsbDriver> UsbMarkers<'a, D> {
    /// Markers for the given slots
    pub fn new(boxes: &'a mut BoxManager<D>, slots: Vec<usize>) -> Self {
        Self {
            boxes,
            slots,
            opened: Vec::new(),
        }
    }

    /// Markers for every enumerated box that fits in the slot table
    pub fn all(boxes: &'a mut BoxManager<D>) -> Result<Self> {
        let count = boxes.device_count().ok_or(BoxError::NotEnumerated)?;
        if count == 0 {
            let config = boxes.config();
            return Err(BoxError::NoDevices {
                vendor_id: config.vendor_id,
                product_id: config.product_id,
            });
        }
        let slots = (0..count.min(boxes.config().max_slots)).collect();
        Ok(Self::new(boxes, slots))
    }

    /// Slots markers are sent to
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }
}

impl<D: UsbDriver> MarkerSink for UsbMarkers<'_, D> {
    fn prime(&mut self) -> Result<()> {
        let packet = snowplough();
        for &slot in &self.slots {
            if !self.boxes.is_open(slot) {
                self.boxes.open(slot)?;
                self.opened.push(slot);
            }
            self.boxes.write_bytes(slot, &packet)?;
        }
        log::debug!("Primed {} trigger box(es)", self.slots.len());
        Ok(())
    }

    fn send(&mut self, code: Option<MarkerCode>, payload: &[u8]) -> Result<()> {
        let chunk = frame(code, payload)?;
        for &slot in &self.slots {
            self.boxes.send_control(slot, MARKER_STROBE)?;
            self.boxes.write_bytes(slot, &chunk)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut first_error = None;
        for slot in std::mem::take(&mut self.opened) {
            if self.boxes.is_open(slot) {
                if let Err(e) = self.boxes.close(slot) {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Writes markers to a text file instead of a box.
///
/// Each marker produces two lines: the strobe request as
/// `[CTL] 0x40 0 2 0 [/CTL]`, then `<seconds>.<micros> <code> <payload>`
/// with the time elapsed since the recorder was created.
pub struct RecordingMarkers<W: Write> {
    out: W,
    started: Instant,
}

impl<W: Write> RecordingMarkers<W> {
    /// Record to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: Instant::now(),
        }
    }

    /// Consume the recorder, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn record(&mut self, code: Option<MarkerCode>, payload: &[u8]) -> std::io::Result<()> {
        let elapsed = self.started.elapsed();
        writeln!(self.out, "[CTL] {} [/CTL]", MARKER_STROBE)?;
        write!(
            self.out,
            "{}.{:06} ",
            elapsed.as_secs(),
            elapsed.subsec_micros()
        )?;
        if let Some(code) = code {
            write!(self.out, "{} ", code)?;
        }
        self.out.write_all(payload)?;
        writeln!(self.out)
    }
}

impl<W: Write> MarkerSink for RecordingMarkers<W> {
    fn prime(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, code: Option<MarkerCode>, payload: &[u8]) -> Result<()> {
        frame(code, payload)?;
        self.record(code, payload).map_err(BoxError::Recording)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(BoxError::Recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_code_ranges() {
        assert_eq!(MarkerCode::stimulus(0, false).unwrap().as_raw(), 128);
        assert_eq!(MarkerCode::stimulus(5, true).unwrap().as_raw(), 165);
        assert_eq!(MarkerCode::stimulus(31, true).unwrap().as_raw(), 191);
        assert!(MarkerCode::stimulus(32, false).is_err());

        assert_eq!(MarkerCode::control(0).unwrap(), MarkerCode::START_OF_RUN);
        assert_eq!(MarkerCode::control(1).unwrap(), MarkerCode::END_OF_RUN);
        assert_eq!(MarkerCode::control(31).unwrap(), MarkerCode::CHUNK);
        assert!(MarkerCode::control(32).is_err());

        assert_eq!(MarkerCode::default().as_raw(), 223);
    }

    #[test]
    fn test_from_raw_rejects_payload_and_reserved_bytes() {
        assert!(MarkerCode::from_raw(0x41).is_err());
        assert!(MarkerCode::from_raw(127).is_err());
        assert!(MarkerCode::from_raw(224).is_err());
        assert!(MarkerCode::from_raw(255).is_err());
        assert!(MarkerCode::from_raw(200).is_ok());
    }

    #[test]
    fn test_code_classification() {
        let target = MarkerCode::stimulus(3, true).unwrap();
        assert!(target.is_stimulus());
        assert!(target.is_target());

        let plain = MarkerCode::stimulus(3, false).unwrap();
        assert!(plain.is_stimulus());
        assert!(!plain.is_target());

        assert!(!MarkerCode::START_OF_RUN.is_stimulus());
        assert!(!MarkerCode::CHUNK.is_target());
    }

    #[test]
    fn test_frame() {
        let chunk = frame(Some(MarkerCode::CHUNK), b"HELLO").unwrap();
        assert_eq!(chunk, [223, b'H', b'E', b'L', b'L', b'O']);

        assert_eq!(frame(None, b"ab").unwrap(), b"ab");
        assert_eq!(frame(Some(MarkerCode::END_OF_RUN), &[]).unwrap(), [193]);
    }

    #[test]
    fn test_frame_rejects_high_payload() {
        let err = frame(Some(MarkerCode::CHUNK), &[1, 2, 0x80]).unwrap_err();
        assert!(matches!(err, BoxError::InvalidMarker(_)));
    }

    #[test]
    fn test_snowplough() {
        let packet = snowplough();
        assert_eq!(packet.len(), 256);
        assert!(packet.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_recording_format() {
        let mut sink = RecordingMarkers::new(Vec::new());
        sink.prime().unwrap();
        sink.send(Some(MarkerCode::CHUNK), b"HELLO").unwrap();
        sink.send(None, b"x").unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "[CTL] 0x40 0 2 0 [/CTL]");
        assert_eq!(lines[2], "[CTL] 0x40 0 2 0 [/CTL]");

        let (stamp, rest) = lines[1].split_once(' ').unwrap();
        let (secs, micros) = stamp.split_once('.').unwrap();
        assert!(secs.parse::<u64>().is_ok());
        assert_eq!(micros.len(), 6);
        assert_eq!(rest, "223 HELLO");
        assert!(lines[3].ends_with(" x"));
    }

    #[test]
    fn test_recording_rejects_invalid_payload() {
        let mut sink = RecordingMarkers::new(Vec::new());
        assert!(sink.send(None, &[0xff]).is_err());
        assert!(sink.into_inner().is_empty());
    }
}
