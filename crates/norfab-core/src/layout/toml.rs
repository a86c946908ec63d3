//! TOML board layout parsing
//!
//! Parses board description files in TOML format:
//!
//! ```toml
//! [geometry]
//! page = 32
//! wordline = 512
//! sector = "16 KiB"
//! erased = 0xFF
//!
//! [[bank]]
//! kind = "data"
//! start = 0xAF000000
//! end = 0xAF0FFFFF
//!
//! [[bank]]
//! kind = "program0"
//! start = 0xA0000000
//! end = 0xA02FFFFF
//! ```

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use crate::error::{Error, Result};
use crate::geometry::FlashGeometry;

use super::{BankKind, BankMap, FlashBank};

/// TOML board file structure
#[derive(Debug, serde::Deserialize)]
struct TomlBoardFile {
    geometry: TomlGeometry,
    bank: Vec<TomlBank>,
}

/// Geometry section
#[derive(Debug, serde::Deserialize)]
struct TomlGeometry {
    #[serde(deserialize_with = "deserialize_size_u32")]
    page: u32,
    #[serde(deserialize_with = "deserialize_size_u32")]
    wordline: u32,
    #[serde(deserialize_with = "deserialize_size_u32")]
    sector: u32,
    #[serde(default = "default_erased", deserialize_with = "deserialize_byte")]
    erased: u8,
}

fn default_erased() -> u8 {
    0xFF
}

/// Bank definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlBank {
    kind: BankKind,
    #[serde(deserialize_with = "deserialize_size_u32")]
    start: u32,
    #[serde(deserialize_with = "deserialize_size_u32")]
    end: u32,
}

/// Deserialize a u32 that can be decimal, hex (0x...), or a size string
/// like "16 KiB"
fn deserialize_size_u32<'de, D>(deserializer: D) -> core::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a byte that can be decimal or hex
fn deserialize_byte<'de, D>(deserializer: D) -> core::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ByteOrStr {
        Int(u8),
        Str(String),
    }

    match ByteOrStr::deserialize(deserializer)? {
        ByteOrStr::Int(n) => Ok(n),
        ByteOrStr::Str(s) => {
            let n = parse_number(&s).map_err(serde::de::Error::custom)?;
            u8::try_from(n).map_err(|_| serde::de::Error::custom("byte out of range"))
        }
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 KiB", "0x4000", or "4096"
fn parse_size(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let base: u32 = num_str
        .parse()
        .map_err(|e| format!("invalid size: {}", e))?;
    base.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflows: {}", s))
}

/// Parse a board layout from a TOML string
pub fn parse_layout_str(content: &str) -> Result<(FlashGeometry, BankMap)> {
    let file: TomlBoardFile = ::toml::from_str(content).map_err(|e| {
        log::debug!("board layout parse failed: {}", e);
        Error::LayoutParse
    })?;

    let geometry = FlashGeometry::new(
        file.geometry.page,
        file.geometry.wordline,
        file.geometry.sector,
        file.geometry.erased,
    )?;

    let mut map = BankMap::new();
    for bank in &file.bank {
        map.add_bank(FlashBank::new(bank.kind, bank.start, bank.end))?;
    }
    if map.banks().is_empty() {
        return Err(Error::InvalidBankMap);
    }

    Ok((geometry, map))
}

/// Read and parse a board layout file
pub fn read_layout_file<P: AsRef<Path>>(path: P) -> Result<(FlashGeometry, BankMap)> {
    let content = fs::read_to_string(path).map_err(|e| {
        log::debug!("board layout read failed: {}", e);
        Error::LayoutParse
    })?;
    parse_layout_str(&content)
}
