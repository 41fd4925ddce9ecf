//! NDJSON session recordings
//!
//! A recording is one JSON-encoded `TelemetrySnapshot` per line. The writer
//! appends live snapshots; the source plays a file back one line per tick.

use anyhow::{Context, Result};
use pitwall_core::{TelemetrySnapshot, TelemetrySource};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Plays back a recorded session
pub struct RecordingSource {
    name: String,
    path: PathBuf,
    looping: bool,
    reader: Option<BufReader<File>>,
    line_number: usize,
    played: usize,
}

impl RecordingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = match path.file_stem() {
            Some(stem) => format!("Recording ({})", stem.to_string_lossy()),
            None => "Recording".to_string(),
        };
        Self {
            name,
            path,
            looping: false,
            reader: None,
            line_number: 0,
            played: 0,
        }
    }

    /// Restart from the first snapshot instead of running dry
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots returned since `start()`
    pub fn played(&self) -> usize {
        self.played
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open recording {}", self.path.display()))?;
        Ok(BufReader::new(file))
    }

    /// Next non-blank line, or `None` at end of file
    fn next_line(&mut self) -> Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }
}

impl TelemetrySource for RecordingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> bool {
        self.path.is_file()
    }

    fn start(&mut self) -> Result<()> {
        self.reader = Some(self.open()?);
        self.line_number = 0;
        self.played = 0;
        info!(path = %self.path.display(), "recording playback started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }

    fn read_snapshot(&mut self) -> Result<Option<TelemetrySnapshot>> {
        let line = match self.next_line()? {
            Some(line) => line,
            None if self.looping && self.played > 0 => {
                self.reader = Some(self.open()?);
                self.line_number = 0;
                match self.next_line()? {
                    Some(line) => line,
                    None => return Ok(None),
                }
            }
            None => return Ok(None),
        };

        let snapshot = serde_json::from_str(line.trim()).with_context(|| {
            format!("Invalid snapshot at {}:{}", self.path.display(), self.line_number)
        })?;
        self.played += 1;
        Ok(Some(snapshot))
    }

    fn is_active(&self) -> bool {
        self.reader.is_some()
    }
}

/// Appends snapshots to an NDJSON recording
pub struct RecordingWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl RecordingWriter {
    /// Open `path` for appending, creating it and its parent directory
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(path = %self.path.display(), "failed to flush recording: {}", e);
        }
    }
}
