//! Message log sinks.
//!
//! Every frame crossing the wire can be written to a [`MessageLog`]. The
//! file sink produces a hex dump for protocol debugging; the null sink
//! discards everything.

use handsync_codec::{ControlKind, Frame};
use handsync_protocol::message;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Which way a frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Desktop to device.
    Sent,
    /// Device to desktop.
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sent => ">>",
            Self::Received => "<<",
        })
    }
}

/// A sink for wire traffic.
pub trait MessageLog: Send {
    /// Records raw bytes.
    fn write_raw(&mut self, direction: Direction, label: &str, bytes: &[u8]) -> io::Result<()>;

    /// Records a general message frame.
    fn dump(&mut self, direction: Direction, frame: &Frame) -> io::Result<()> {
        let name = message::lookup(frame.tag()).map_or("unregistered", |spec| spec.name);
        let label = format!(
            "{} ({name}) content={} checksum={:04x}{}",
            frame.tag(),
            frame.cont_size(),
            frame.checksum(),
            if frame.checksum_matches() { "" } else { " MISMATCH" }
        );
        let bytes = frame
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_raw(direction, &label, &bytes)
    }

    /// Records a control frame.
    fn control(&mut self, direction: Direction, kind: ControlKind) -> io::Result<()> {
        self.write_raw(direction, &kind.to_string(), &kind.frame())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl MessageLog for NullLog {
    fn write_raw(&mut self, _direction: Direction, _label: &str, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn dump(&mut self, _direction: Direction, _frame: &Frame) -> io::Result<()> {
        Ok(())
    }
}

/// Appends a hex dump of every frame to a file.
#[derive(Debug)]
pub struct FileMessageLog {
    path: PathBuf,
    file: File,
}

impl FileMessageLog {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageLog for FileMessageLog {
    fn write_raw(&mut self, direction: Direction, label: &str, bytes: &[u8]) -> io::Result<()> {
        let mut text = format!("{direction} {label} [{} bytes]\n", bytes.len());
        hex_dump(&mut text, bytes);
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

/// Formats `bytes` as 16-byte rows of offset, hex and printable ASCII.
fn hex_dump(out: &mut String, bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hex = hex::encode(chunk);
        let pairs: Vec<&str> = (0..chunk.len()).map(|i| &hex[i * 2..i * 2 + 2]).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        out.push_str(&format!("  {:04x}  {:<47}  {ascii}\n", row * 16, pairs.join(" ")));
    }
}
