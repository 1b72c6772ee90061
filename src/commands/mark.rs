//! Event marker command

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::thread;
use std::time::Duration;

use bsusb_core::{BoxManager, MarkerCode, MarkerSink, RecordingMarkers, UsbDriver, UsbMarkers};

/// Send `count` markers to every box, or record them to `record`
pub fn run_mark<D: UsbDriver>(
    boxes: &mut BoxManager<D>,
    code: u8,
    text: &str,
    count: usize,
    interval_ms: u64,
    record: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let code = MarkerCode::from_raw(code)?;
    let interval = Duration::from_millis(interval_ms);

    match record {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
            log::info!("Recording markers to {}", path.display());
            let mut sink = RecordingMarkers::new(BufWriter::new(file));
            send_markers(&mut sink, code, text.as_bytes(), count, interval)
        }
        None => {
            let mut sink = UsbMarkers::all(boxes)?;
            log::info!("Sending markers to {} box(es)", sink.slots().len());
            send_markers(&mut sink, code, text.as_bytes(), count, interval)
        }
    }
}

/// Prime `sink`, send the markers and finish it
///
/// The sink is finished even when a marker fails; the marker error wins.
pub fn send_markers<S: MarkerSink>(
    sink: &mut S,
    code: MarkerCode,
    payload: &[u8],
    count: usize,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = (|| {
        sink.prime()?;
        for i in 0..count {
            if i > 0 {
                thread::sleep(interval);
            }
            sink.send(Some(code), payload)?;
            log::debug!("Marker {} sent ({})", i + 1, code);
        }
        Ok::<_, bsusb_core::BoxError>(())
    })();

    let finished = sink.finish();
    result?;
    finished?;
    println!("Sent {} marker(s) with code {}", count, code);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_markers_records() {
        let mut sink = RecordingMarkers::new(Vec::new());
        send_markers(
            &mut sink,
            MarkerCode::START_OF_RUN,
            b"run1",
            2,
            Duration::ZERO,
        )
        .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "[CTL] 0x40 0 2 0 [/CTL]");
        assert!(lines[1].ends_with(" 192 run1"));
        assert_eq!(lines[2], "[CTL] 0x40 0 2 0 [/CTL]");
    }

    #[test]
    fn test_send_markers_rejects_high_payload() {
        let mut sink = RecordingMarkers::new(Vec::new());
        let err = send_markers(&mut sink, MarkerCode::CHUNK, &[0xC0], 1, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<bsusb_core::BoxError>(),
            Some(bsusb_core::BoxError::InvalidMarker(_))
        ));
        assert!(sink.into_inner().is_empty());
    }
}
