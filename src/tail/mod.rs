//! Line source: follows a growing, rotatable log file line by line.
//!
//! Uses synchronous `std::fs` reads since these are quick local operations;
//! the only suspension point is the bounded wait between polls when no new
//! data is available. That wait observes the shutdown channel.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

/// Bytes kept per line; the rest of a longer line is skipped up to its newline.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One physical line from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line text without the trailing newline.
    pub text: String,
    /// Byte offset of the line's first byte in the file it was read from.
    pub offset: u64,
}

impl RawLine {
    /// Build a line with an unknown offset (0).
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
        }
    }
}

/// Failures that end a line source instance.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be opened (missing, unreadable, seek failed).
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Reading from an open file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// How a [`LineSource`] opens and follows its file.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Yield existing content instead of seeking to the end.
    pub from_beginning: bool,
    /// Reopen the path when it is replaced or truncated.
    pub follow_rotation: bool,
    /// Wait between reads when no new data is available.
    pub poll_interval: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            from_beginning: false,
            follow_rotation: true,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Identity of an opened file, used to notice that the path now names a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        dev: metadata.dev(),
        ino: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<FileId> {
    None
}

/// A live, effectively infinite stream of lines from one log path.
pub struct LineSource {
    path: PathBuf,
    reader: BufReader<File>,
    id: Option<FileId>,
    offset: u64,
    /// Offset of the first byte of the line being assembled.
    line_start: u64,
    /// Bytes of a line whose newline has not been written yet, capped at
    /// [`MAX_LINE_BYTES`].
    partial: Vec<u8>,
    /// Bytes of the current line skipped past the cap.
    overflow: u64,
    options: SourceOptions,
}

impl LineSource {
    /// Open `path` for tailing.
    ///
    /// Seeks to the end unless `options.from_beginning` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the file is missing or unreadable.
    pub fn open(path: &Path, options: SourceOptions) -> Result<Self, SourceError> {
        let open_err = |source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        let metadata = file.metadata().map_err(open_err)?;
        let mut reader = BufReader::new(file);

        let offset = if options.from_beginning {
            0
        } else {
            reader.seek(SeekFrom::End(0)).map_err(open_err)?
        };

        info!(
            path = %path.display(),
            offset,
            from_beginning = options.from_beginning,
            "opened slow log"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            id: file_id(&metadata),
            offset,
            line_start: offset,
            partial: Vec::new(),
            overflow: 0,
            options,
        })
    }

    /// Path being tailed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset just past the last byte consumed.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Wait for the next complete line.
    ///
    /// Returns `Ok(None)` once shutdown is signalled (or the shutdown sender
    /// is dropped). Blank lines are returned as-is; skipping them is the
    /// segmenter's job.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Read`] on I/O failure and [`SourceError::Open`]
    /// when a rotated file cannot be reopened.
    pub async fn next_line(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<RawLine>, SourceError> {
        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }

            if let Some(line) = self.read_available()? {
                return Ok(Some(line));
            }

            if self.options.follow_rotation && self.check_rotation()? {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Read one complete line if one is already available.
    ///
    /// Consumes whatever the file holds up to the next newline. Bytes of an
    /// unfinished line stay in `partial` for the next call.
    fn read_available(&mut self) -> Result<Option<RawLine>, SourceError> {
        loop {
            let available = self.reader.fill_buf().map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;
            if available.is_empty() {
                return Ok(None);
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let content = &available[..newline.unwrap_or(available.len())];
            let room = MAX_LINE_BYTES.saturating_sub(self.partial.len());
            let kept = content.len().min(room);
            self.partial.extend_from_slice(&content[..kept]);
            self.overflow = self
                .overflow
                .saturating_add(len_u64(content.len().saturating_sub(kept)));

            let consumed = newline.map_or(available.len(), |pos| pos.saturating_add(1));
            self.reader.consume(consumed);
            self.offset = self.offset.saturating_add(len_u64(consumed));

            if newline.is_some() {
                return Ok(Some(self.finish_line()));
            }
        }
    }

    /// Turn `partial` into a line and start the next one.
    fn finish_line(&mut self) -> RawLine {
        let mut buf = std::mem::take(&mut self.partial);
        if self.overflow > 0 {
            debug!(
                offset = self.line_start,
                skipped = self.overflow,
                "truncated oversized log line"
            );
        } else if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let line = RawLine {
            text: String::from_utf8_lossy(&buf).into_owned(),
            offset: self.line_start,
        };
        self.line_start = self.offset;
        self.overflow = 0;
        line
    }

    /// Detect replacement or truncation of the path and reposition.
    ///
    /// Returns `true` when the source switched to new content.
    fn check_rotation(&mut self) -> Result<bool, SourceError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            // Rotated away and not recreated yet; keep the old handle.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(SourceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let current = file_id(&metadata);
        if current.is_some() && current != self.id {
            info!(path = %self.path.display(), "slow log replaced, reopening");
            self.reopen()?;
            return Ok(true);
        }

        if metadata.len() < self.offset {
            info!(
                path = %self.path.display(),
                previous_offset = self.offset,
                current_len = metadata.len(),
                "slow log truncated, reading from the start"
            );
            self.reader
                .seek(SeekFrom::Start(0))
                .map_err(|source| SourceError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            self.offset = 0;
            self.line_start = 0;
            self.partial.clear();
            self.overflow = 0;
            return Ok(true);
        }

        Ok(false)
    }

    fn reopen(&mut self) -> Result<(), SourceError> {
        let open_err = |source| SourceError::Open {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(open_err)?;
        let metadata = file.metadata().map_err(open_err)?;

        self.reader = BufReader::new(file);
        self.id = file_id(&metadata);
        self.offset = 0;
        self.line_start = 0;
        self.partial.clear();
        self.overflow = 0;
        Ok(())
    }
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
