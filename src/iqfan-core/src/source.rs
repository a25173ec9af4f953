// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::net::TcpStream;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Abstraction over any raw byte source (file, stdin, network tap).
pub trait ByteSource: Send + 'static {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapter for any [`Read`] implementor.
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read + Send + 'static> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send + 'static> ByteSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Fill `buf` from `source` until it is full or the source is exhausted.
pub fn read_full(source: &mut dyn ByteSource, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_chunk(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Stdin,
    File {
        path: PathBuf,
    },
    /// Raw sample relay from a remote tuner.
    Tcp {
        addr: String,
    },
}

impl SourceKind {
    pub fn open(&self) -> io::Result<Box<dyn ByteSource>> {
        match self {
            Self::Stdin => {
                info!("Reading samples from stdin");
                Ok(Box::new(ReaderSource::new(io::stdin())))
            }
            Self::File { path } => {
                info!("Reading samples from {}", path.display());
                Ok(Box::new(ReaderSource::new(BufReader::new(File::open(
                    path,
                )?))))
            }
            Self::Tcp { addr } => {
                info!("Connecting to sample relay at {}", addr);
                let stream = TcpStream::connect(addr.as_str())?;
                stream.set_nodelay(true)?;
                Ok(Box::new(ReaderSource::new(stream)))
            }
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => f.write_str("stdin"),
            Self::File { path } => write!(f, "file {}", path.display()),
            Self::Tcp { addr } => write!(f, "tcp {}", addr),
        }
    }
}
