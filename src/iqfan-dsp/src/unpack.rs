// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Raw byte buffer to numeric sample decoding.
//!
//! A [`WordType`] names the element layout of a raw capture: kind
//! (signed, unsigned, float), width in bytes and byte order. Decoding is
//! a plain numeric conversion to `f64`; no offset removal or scaling is
//! applied.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unrecognized word type '{0}'")]
    Unrecognized(String),

    #[error("unsupported width {width} for {kind} words")]
    UnsupportedWidth { kind: WordKind, width: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Signed,
    Unsigned,
    Float,
}

impl fmt::Display for WordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WordKind::Signed => "signed",
            WordKind::Unsigned => "unsigned",
            WordKind::Float => "float",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
    Native,
}

/// Element layout of a raw sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WordType {
    kind: WordKind,
    width: usize,
    endian: Endian,
}

impl WordType {
    pub fn new(kind: WordKind, width: usize, endian: Endian) -> Result<Self, FormatError> {
        let supported = match kind {
            WordKind::Signed | WordKind::Unsigned => matches!(width, 1 | 2 | 4 | 8),
            WordKind::Float => matches!(width, 4 | 8),
        };
        if !supported {
            return Err(FormatError::UnsupportedWidth { kind, width });
        }
        Ok(Self {
            kind,
            width,
            endian,
        })
    }

    pub fn kind(&self) -> WordKind {
        self.kind
    }

    /// Element width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Decode `bytes` into one `f64` per complete element.
    ///
    /// A trailing partial element is ignored, so the output length is
    /// always `bytes.len() / width`.
    pub fn unpack(&self, bytes: &[u8]) -> Vec<f64> {
        let mut out = Vec::with_capacity(bytes.len() / self.width);
        self.unpack_into(bytes, &mut out);
        out
    }

    pub fn unpack_into(&self, bytes: &[u8], out: &mut Vec<f64>) {
        out.clear();
        out.extend(bytes.chunks_exact(self.width).map(|c| self.decode(c)));
    }

    fn decode(&self, c: &[u8]) -> f64 {
        macro_rules! word {
            ($t:ty, $c:expr, $endian:expr) => {
                match $endian {
                    Endian::Big => <$t>::from_be_bytes(fixed($c)),
                    Endian::Little => <$t>::from_le_bytes(fixed($c)),
                    Endian::Native => <$t>::from_ne_bytes(fixed($c)),
                }
            };
        }

        let e = self.endian;
        match (self.kind, self.width) {
            (WordKind::Unsigned, 1) => f64::from(c[0]),
            (WordKind::Signed, 1) => f64::from(c[0] as i8),
            (WordKind::Unsigned, 2) => f64::from(word!(u16, c, e)),
            (WordKind::Signed, 2) => f64::from(word!(i16, c, e)),
            (WordKind::Unsigned, 4) => f64::from(word!(u32, c, e)),
            (WordKind::Signed, 4) => f64::from(word!(i32, c, e)),
            (WordKind::Unsigned, _) => word!(u64, c, e) as f64,
            (WordKind::Signed, _) => word!(i64, c, e) as f64,
            (WordKind::Float, 4) => f64::from(word!(f32, c, e)),
            (WordKind::Float, _) => word!(f64, c, e),
        }
    }
}

fn fixed<const N: usize>(c: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&c[..N]);
    bytes
}

impl FromStr for WordType {
    type Err = FormatError;

    /// Parse a numpy-style descriptor (`i2`, `<i2`, `>u1`, `=f8`) or a
    /// long alias (`int16`, `uint8`, `float32`). No prefix means big-endian.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unrecognized = || FormatError::Unrecognized(s.to_string());

        let (endian, body) = match trimmed.chars().next() {
            Some('<') => (Endian::Little, &trimmed[1..]),
            Some('>') | Some('|') => (Endian::Big, &trimmed[1..]),
            Some('=') => (Endian::Native, &trimmed[1..]),
            _ => (Endian::Big, trimmed),
        };

        let lower = body.to_ascii_lowercase();
        let (kind, width) = match lower.as_str() {
            "int8" => (WordKind::Signed, 1),
            "int16" => (WordKind::Signed, 2),
            "int32" => (WordKind::Signed, 4),
            "int64" => (WordKind::Signed, 8),
            "uint8" => (WordKind::Unsigned, 1),
            "uint16" => (WordKind::Unsigned, 2),
            "uint32" => (WordKind::Unsigned, 4),
            "uint64" => (WordKind::Unsigned, 8),
            "float32" => (WordKind::Float, 4),
            "float64" => (WordKind::Float, 8),
            short => {
                let mut chars = short.chars();
                let kind = match chars.next() {
                    Some('i') => WordKind::Signed,
                    Some('u') => WordKind::Unsigned,
                    Some('f') => WordKind::Float,
                    _ => return Err(unrecognized()),
                };
                let width: usize = chars.as_str().parse().map_err(|_| unrecognized())?;
                (kind, width)
            }
        };

        WordType::new(kind, width, endian)
    }
}

impl fmt::Display for WordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match (self.width, self.endian) {
            (1, _) => "|",
            (_, Endian::Big) => ">",
            (_, Endian::Little) => "<",
            (_, Endian::Native) => "=",
        };
        let kind = match self.kind {
            WordKind::Signed => 'i',
            WordKind::Unsigned => 'u',
            WordKind::Float => 'f',
        };
        write!(f, "{}{}{}", prefix, kind, self.width)
    }
}

impl TryFrom<String> for WordType {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WordType> for String {
    fn from(value: WordType) -> Self {
        value.to_string()
    }
}

impl Default for WordType {
    /// Signed 16-bit big-endian.
    fn default() -> Self {
        Self {
            kind: WordKind::Signed,
            width: 2,
            endian: Endian::Big,
        }
    }
}
