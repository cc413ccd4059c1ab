//! Landmark frame stream written by the external hand-tracking process.
//!
//! One JSON object per line; an absent hand is an empty landmark list.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

use crate::landmarks::Point;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub landmarks: Vec<Point>,
}

/// Effectively-infinite frame sequence; `None` means the stream ended and
/// the source must be reopened.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>>;
}

pub struct JsonlFrames<R: BufRead> {
    reader: R,
    line: String,
}

impl<R: BufRead> JsonlFrames<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> FrameSource for JsonlFrames<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            let raw = self.line.trim();
            if raw.is_empty() {
                continue;
            }
            match serde_json::from_str::<LandmarkFrame>(raw) {
                Ok(frame) => return Ok(Some(frame)),
                // a torn or malformed line is a sensing gap, not a reason
                // to stop the stream
                Err(e) => warn!("skipping malformed landmark frame: {e}"),
            }
        }
    }
}

/// Opens the landmark stream (a FIFO or growing file) the extractor
/// writes. Blocks until a writer shows up when the path is a FIFO.
pub fn open_stream(path: &Path) -> Result<JsonlFrames<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open landmark stream {}", path.display()))?;
    Ok(JsonlFrames::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_frames_in_order() {
        let data = concat!(
            "{\"landmarks\":[{\"x\":1.0,\"y\":2.0}]}\n",
            "{\"landmarks\":[]}\n",
        );
        let mut src = JsonlFrames::new(Cursor::new(data));

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.landmarks, vec![Point::new(1.0, 2.0)]);

        let second = src.next_frame().unwrap().unwrap();
        assert!(second.landmarks.is_empty());

        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_skips_malformed_and_blank_lines() {
        let data = "\nnot json\n{\"landmarks\":[{\"x\":3.0,\"y\":4.0}]}\n";
        let mut src = JsonlFrames::new(Cursor::new(data));

        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.landmarks, vec![Point::new(3.0, 4.0)]);
    }

    #[test]
    fn test_missing_landmarks_field_is_empty_hand() {
        let mut src = JsonlFrames::new(Cursor::new("{}\n"));
        let frame = src.next_frame().unwrap().unwrap();
        assert!(frame.landmarks.is_empty());
    }
}
