//! Human-readable byte quantities.
//!
//! Decimal units scale by powers of 1000, binary units by powers of 1024.
//! `BYTES` belongs to both families. Parsing rejects anything that would not
//! fit in a `u64`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteUnit {
    Bytes,
    KB,
    KiB,
    MB,
    MiB,
    GB,
    GiB,
    TB,
    TiB,
    PB,
    PiB,
}

impl ByteUnit {
    /// Binary units from largest to smallest, used when formatting.
    const BINARY_DESC: [ByteUnit; 6] = [
        ByteUnit::PiB,
        ByteUnit::TiB,
        ByteUnit::GiB,
        ByteUnit::MiB,
        ByteUnit::KiB,
        ByteUnit::Bytes,
    ];

    pub const fn factor(self) -> u64 {
        match self {
            ByteUnit::Bytes => 1,
            ByteUnit::KB => 1_000,
            ByteUnit::KiB => 1 << 10,
            ByteUnit::MB => 1_000_000,
            ByteUnit::MiB => 1 << 20,
            ByteUnit::GB => 1_000_000_000,
            ByteUnit::GiB => 1 << 30,
            ByteUnit::TB => 1_000_000_000_000,
            ByteUnit::TiB => 1 << 40,
            ByteUnit::PB => 1_000_000_000_000_000,
            ByteUnit::PiB => 1 << 50,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            ByteUnit::Bytes => "B",
            ByteUnit::KB => "kB",
            ByteUnit::KiB => "KiB",
            ByteUnit::MB => "MB",
            ByteUnit::MiB => "MiB",
            ByteUnit::GB => "GB",
            ByteUnit::GiB => "GiB",
            ByteUnit::TB => "TB",
            ByteUnit::TiB => "TiB",
            ByteUnit::PB => "PB",
            ByteUnit::PiB => "PiB",
        }
    }

    /// Look up a unit by suffix. An empty suffix means bytes.
    pub fn from_suffix(s: &str) -> Option<Self> {
        let unit = match s {
            "" | "B" => ByteUnit::Bytes,
            "k" | "kB" | "K" | "KB" => ByteUnit::KB,
            "Ki" | "KiB" => ByteUnit::KiB,
            "M" | "MB" => ByteUnit::MB,
            "Mi" | "MiB" => ByteUnit::MiB,
            "G" | "GB" => ByteUnit::GB,
            "Gi" | "GiB" => ByteUnit::GiB,
            "T" | "TB" => ByteUnit::TB,
            "Ti" | "TiB" => ByteUnit::TiB,
            "P" | "PB" => ByteUnit::PB,
            "Pi" | "PiB" => ByteUnit::PiB,
            _ => return None,
        };
        Some(unit)
    }

    /// Convert `value` of this unit into bytes, failing on overflow.
    pub fn to_bytes(self, value: u64) -> Result<u64> {
        value.checked_mul(self.factor()).ok_or_else(|| {
            Error::InvalidArgument(format!("{}{} does not fit in 64 bits", value, self.symbol()))
        })
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parse strings like `"1000"`, `"50MiB"`, `"2 GB"` or `"10Gi"` into bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    if digits.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "size '{}' does not start with a number",
            input
        )));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("size '{}' is out of range", input)))?;
    let unit = ByteUnit::from_suffix(suffix.trim())
        .ok_or_else(|| Error::InvalidArgument(format!("unknown size unit in '{}'", input)))?;
    unit.to_bytes(value)
}

/// Render `bytes` with the largest binary unit that divides it exactly.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    for unit in ByteUnit::BINARY_DESC {
        if bytes % unit.factor() == 0 {
            return format!("{}{}", bytes / unit.factor(), unit.symbol());
        }
    }
    format!("{}B", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_sizes() {
        assert_eq!(parse_size("1000").unwrap(), 1000);
        assert_eq!(parse_size("50MiB").unwrap(), 50 * 1024 * 1024);
        assert_eq!(parse_size("2 GB").unwrap(), 2_000_000_000);
        assert_eq!(parse_size("10Gi").unwrap(), 10 << 30);
        assert_eq!(parse_size(" 4k ").unwrap(), 4_000);
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        assert!(matches!(parse_size("-1"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_size("12XB"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_size(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            parse_size("99999PiB"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn formats_with_largest_exact_unit() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1536), "1536B");
        assert_eq!(format_size(2048), "2KiB");
        assert_eq!(format_size(50 << 20), "50MiB");
        assert_eq!(format_size(1001), "1001B");
    }
}
