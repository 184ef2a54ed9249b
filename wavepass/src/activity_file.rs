//! File-backed activity sink.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use wavepass_core::environment::Clock;
use wavepass_core::{ActivityEntry, ActivityEvent, ActivitySink};

/// Appends one timestamped line per event to a file.
///
/// Write failures are logged and otherwise ignored; losing a line of the
/// activity file never stops a worker.
pub struct FileActivitySink {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    writer: Mutex<LineWriter<File>>,
}

impl FileActivitySink {
    /// Open `path` for appending, creating it if needed. Lines are stamped
    /// with `clock`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            clock,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    /// File being written
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileActivitySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileActivitySink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ActivitySink for FileActivitySink {
    fn record(&self, event: ActivityEvent) {
        let entry = ActivityEntry {
            at: self.clock.now(),
            event,
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writeln!(writer, "{entry}") {
            tracing::warn!(path = %self.path.display(), %error, "Failed to append activity line");
        }
    }
}
