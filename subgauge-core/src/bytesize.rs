//! Byte-unit formatting for traffic display.
//!
//! Traffic values in synthetic group names are rendered as
//! `<value><unit>` with integer division, e.g. 1.5 GiB with unit `G`
//! renders as `1G`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display unit for byte values, scaled in powers of 1024.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteUnit {
    /// Bytes.
    B,
    /// Kibibytes.
    K,
    /// Mebibytes.
    M,
    /// Gibibytes.
    #[default]
    G,
    /// Tebibytes.
    T,
}

impl ByteUnit {
    /// Returns the number of bytes one unit represents.
    pub fn divisor(self) -> u64 {
        match self {
            Self::B => 1,
            Self::K => 1 << 10,
            Self::M => 1 << 20,
            Self::G => 1 << 30,
            Self::T => 1 << 40,
        }
    }

    /// Returns the unit suffix used in rendered values.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::K => "K",
            Self::M => "M",
            Self::G => "G",
            Self::T => "T",
        }
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ByteUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Self::B),
            "K" => Ok(Self::K),
            "M" => Ok(Self::M),
            "G" => Ok(Self::G),
            "T" => Ok(Self::T),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized unit string.
#[derive(Debug, thiserror::Error)]
#[error("unknown byte unit: {0}")]
pub struct UnknownUnit(pub String);

/// Formats a byte count in the given unit using integer division.
pub fn format_bytes(bytes: u64, unit: ByteUnit) -> String {
    format!("{}{}", bytes / unit.divisor(), unit.symbol())
}
