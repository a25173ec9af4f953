// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Output sinks.
//!
//! Every sink accepts demodulated `f64` values and emits them as IEEE-754
//! doubles in native byte order. A sink is owned by exactly one chain or
//! VFO worker.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::liveness::Liveness;

/// How often a pipe open retries while waiting for a reader.
pub const PIPE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    #[default]
    Stdout,
    File {
        path: PathBuf,
    },
    /// Named pipe, created if absent.
    Pipe {
        path: PathBuf,
    },
}

impl SinkConfig {
    /// File and pipe sinks can be split per VFO.
    pub fn supports_fanout(&self) -> bool {
        !matches!(self, Self::Stdout)
    }

    /// Sink for VFO `index`: `<path>.<index>`.
    pub fn for_vfo(&self, index: usize) -> Self {
        let suffixed = |path: &Path| {
            let mut name = path.as_os_str().to_os_string();
            name.push(format!(".{index}"));
            PathBuf::from(name)
        };
        match self {
            Self::Stdout => Self::Stdout,
            Self::File { path } => Self::File {
                path: suffixed(path),
            },
            Self::Pipe { path } => Self::Pipe {
                path: suffixed(path),
            },
        }
    }
}

impl std::fmt::Display for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::File { path } => write!(f, "file {}", path.display()),
            Self::Pipe { path } => write!(f, "pipe {}", path.display()),
        }
    }
}

/// Serialize values as native-endian doubles.
pub fn encode_samples(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_ne_bytes());
    }
    out
}

pub enum Sink {
    File(BufWriter<File>),
    Pipe(File),
    Stdout(io::Stdout),
    /// Hands each output block to an in-process consumer.
    Channel(Sender<Arc<[f64]>>),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::File(_) => "File",
            Self::Pipe(_) => "Pipe",
            Self::Stdout(_) => "Stdout",
            Self::Channel(_) => "Channel",
        };
        f.debug_tuple("Sink").field(&kind).finish()
    }
}

impl Sink {
    /// Open the sink described by `config`.
    ///
    /// Opening a pipe blocks until a reader attaches, polling `liveness`.
    pub fn open(config: &SinkConfig, liveness: &Liveness) -> PipelineResult<Self> {
        match config {
            SinkConfig::Stdout => Ok(Self::Stdout(io::stdout())),
            SinkConfig::File { path } => Ok(Self::File(BufWriter::new(File::create(path)?))),
            SinkConfig::Pipe { path } => Ok(Self::Pipe(fifo::open(path, liveness)?)),
        }
    }

    pub fn channel(tx: Sender<Arc<[f64]>>) -> Self {
        Self::Channel(tx)
    }

    pub fn write_samples(&mut self, values: &[f64]) -> io::Result<()> {
        match self {
            Self::File(w) => w.write_all(&encode_samples(values)),
            Self::Pipe(w) => w.write_all(&encode_samples(values)),
            Self::Stdout(w) => w.lock().write_all(&encode_samples(values)),
            Self::Channel(tx) => tx
                .send(Arc::from(values))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "sink consumer gone")),
        }
    }

    /// Flush buffered output. Dropping the sink afterwards closes it.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Pipe(w) => w.flush(),
            Self::Stdout(w) => w.flush(),
            Self::Channel(_) => Ok(()),
        }
    }
}

#[cfg(unix)]
mod fifo {
    use std::ffi::CString;
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use tracing::{debug, info};

    use super::PIPE_POLL_INTERVAL;
    use crate::error::{PipelineError, PipelineResult, TerminationCause};
    use crate::liveness::Liveness;

    fn ensure_fifo(path: &Path) -> PipelineResult<()> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_fifo() => Ok(()),
            Ok(_) => Err(PipelineError::config(format!(
                "{} exists and is not a named pipe",
                path.display()
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let c_path = CString::new(path.as_os_str().as_bytes())
                    .map_err(|_| PipelineError::config("pipe path contains a NUL byte"))?;
                let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
                if rc != 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::AlreadyExists {
                        return Err(err.into());
                    }
                }
                info!("Created named pipe {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_blocking(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Open the write end without blocking on a missing reader, then switch
    /// to blocking writes.
    pub(super) fn open(path: &Path, liveness: &Liveness) -> PipelineResult<File> {
        ensure_fifo(path)?;
        let mut waiting_logged = false;
        loop {
            if liveness.is_halted() {
                return Err(PipelineError::Termination(TerminationCause::Halted));
            }
            match OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
            {
                Ok(file) => {
                    set_blocking(&file)?;
                    debug!("Reader attached to {}", path.display());
                    return Ok(file);
                }
                Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                    if !waiting_logged {
                        info!("Waiting for a reader on {}", path.display());
                        waiting_logged = true;
                    }
                    std::thread::sleep(PIPE_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(not(unix))]
mod fifo {
    use std::fs::{File, OpenOptions};
    use std::path::Path;

    use crate::error::PipelineResult;
    use crate::liveness::Liveness;

    pub(super) fn open(path: &Path, _liveness: &Liveness) -> PipelineResult<File> {
        Ok(OpenOptions::new().write(true).create(true).open(path)?)
    }
}
