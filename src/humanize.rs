//! Human-readable byte size parsing for config limits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid size format: {0}")]
    InvalidFormat(String),

    #[error("invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
}

const UNITS: &[(&str, u64)] = &[
    ("GB", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("KB", 1024),
    ("B", 1),
];

/// Byte count that deserializes from either `"25MB"`-style strings or
/// plain integers. Asset upload limits in config use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if let Ok(num) = s.parse::<u64>() {
            return Ok(ByteSize(num));
        }

        for (suffix, multiplier) in UNITS {
            if let Some(num_str) = s.strip_suffix(suffix) {
                let num: u64 = num_str.trim().parse()?;
                return Ok(ByteSize(num * multiplier));
            }
        }

        Err(ParseError::InvalidFormat(s))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, multiplier) in UNITS {
            if self.0 >= *multiplier && self.0 % multiplier == 0 {
                return write!(f, "{}{}", self.0 / multiplier, suffix);
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size string (e.g. \"25MB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_number() {
        assert_eq!("4096".parse::<ByteSize>().unwrap().as_u64(), 4096);
    }

    #[test]
    fn parse_with_unit() {
        assert_eq!("2KB".parse::<ByteSize>().unwrap().as_u64(), 2048);
        assert_eq!("25MB".parse::<ByteSize>().unwrap().as_u64(), 25 * 1024 * 1024);
        assert_eq!("1GB".parse::<ByteSize>().unwrap().as_u64(), 1024 * 1024 * 1024);
        assert_eq!("512B".parse::<ByteSize>().unwrap().as_u64(), 512);
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!("25mb".parse::<ByteSize>().unwrap().as_u64(), 25 * 1024 * 1024);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("25XB".parse::<ByteSize>().is_err());
        assert!("".parse::<ByteSize>().is_err());
    }

    #[test]
    fn display_round_units() {
        assert_eq!(ByteSize(2048).to_string(), "2KB");
        assert_eq!(ByteSize(25 * 1024 * 1024).to_string(), "25MB");
        assert_eq!(ByteSize(100).to_string(), "100B");
    }

    #[test]
    fn deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct Limits {
            max: ByteSize,
        }

        let from_str: Limits = serde_json::from_str(r#"{"max": "25MB"}"#).unwrap();
        assert_eq!(from_str.max.as_u64(), 25 * 1024 * 1024);

        let from_num: Limits = serde_json::from_str(r#"{"max": 1024}"#).unwrap();
        assert_eq!(from_num.max.as_u64(), 1024);
    }
}
