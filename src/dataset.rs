//! Offline replay of recorded detections.
//!
//! One JSON object per line:
//!
//! ```text
//! {"time": 0.033, "markers": [{"payload": "...", "corners": [[x, y], [x, y], [x, y], [x, y]]}], "command": "set_center"}
//! ```
//!
//! `markers` may be omitted for a frame without detections. The optional
//! `command` is queued after the frame is yielded, so it applies once that
//! frame has been processed, like a key press during live capture.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::Sender;

use anyhow::{Context as AnyhowContext, Result};
use log::warn;
use serde::Deserialize;

use crate::frame::{Frame, FrameSource};
use crate::marker::DetectedMarker;
use crate::my_types::*;
use crate::tracker::Command;

#[derive(Debug, Deserialize)]
struct MarkerRecord {
    payload: String,
    corners: [[f64; 2]; 4],
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    time: f64,
    #[serde(default)]
    markers: Vec<MarkerRecord>,
    #[serde(default)]
    command: Option<String>,
}

fn parse_command(name: &str) -> Option<Command> {
    match name {
        "set_center" => Some(Command::SetCenter),
        "reset_center" => Some(Command::ResetCenter),
        "quit" => Some(Command::Quit),
        _ => None,
    }
}

pub struct Dataset<R> {
    reader: R,
    line: String,
    line_number: usize,
    length: u64,
    commands: Sender<Command>,
}

impl Dataset<BufReader<File>> {
    pub fn open(path: &Path, commands: Sender<Command>) -> Result<Self> {
        let count_file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let length = BufReader::new(count_file)
            .lines()
            .filter(|line| line.as_ref().map(|l| !l.trim().is_empty()).unwrap_or(true))
            .count() as u64;
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), length, commands))
    }
}

impl<R: BufRead> Dataset<R> {
    pub fn from_reader(reader: R, length: u64, commands: Sender<Command>) -> Self {
        Dataset {
            reader,
            line: String::new(),
            line_number: 0,
            length,
            commands,
        }
    }
}

impl<R: BufRead> FrameSource for Dataset<R> {
    type Image = Vec<DetectedMarker>;

    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>> {
        loop {
            self.line.clear();
            self.line_number += 1;
            let read = self
                .reader
                .read_line(&mut self.line)
                .with_context(|| format!("Failed to read replay line {}", self.line_number))?;
            if read == 0 {
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }

            let record: FrameRecord = serde_json::from_str(&self.line).with_context(|| {
                format!("JSON deserialization failed for line {}: {}", self.line_number, self.line.trim())
            })?;

            let markers = record
                .markers
                .into_iter()
                .map(|m| {
                    let corners = m.corners.map(|[x, y]| Vector2d::new(x, y));
                    DetectedMarker::from_corners(m.payload, corners)
                })
                .collect();

            if let Some(name) = record.command {
                match parse_command(&name) {
                    Some(command) => {
                        let _ = self.commands.send(command);
                    }
                    None => warn!("Unknown replay command {name:?} on line {}", self.line_number),
                }
            }

            return Ok(Some(Frame {
                time: record.time,
                image: markers,
            }));
        }
    }

    fn length(&self) -> Option<u64> {
        Some(self.length)
    }
}
