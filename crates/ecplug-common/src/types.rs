//! Core types for ecplug
//!
//! The redundancy scheme (`ErasureSchema`) describes which codec to use and
//! how many data and parity units a block is split into.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known codec names
pub mod codec {
    /// Reed-Solomon
    pub const RS: &str = "rs";
    /// Single-parity XOR
    pub const XOR: &str = "xor";
}

/// Option keys understood by [`ErasureSchema::from_options`]
pub const CODEC_NAME_KEY: &str = "codec";
pub const NUM_DATA_UNITS_KEY: &str = "numDataUnits";
pub const NUM_PARITY_UNITS_KEY: &str = "numParityUnits";

/// Redundancy scheme: codec name plus data/parity unit counts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureSchema {
    /// Codec name (e.g. "rs", "xor")
    codec_name: String,
    /// Number of data units (k)
    num_data_units: usize,
    /// Number of parity units (m)
    num_parity_units: usize,
    /// Codec-specific options, passed through untouched
    #[serde(default)]
    extra_options: BTreeMap<String, String>,
}

impl ErasureSchema {
    /// Create a new schema without extra options
    pub fn new(codec_name: impl Into<String>, num_data_units: usize, num_parity_units: usize) -> Self {
        Self {
            codec_name: codec_name.into().to_lowercase(),
            num_data_units,
            num_parity_units,
            extra_options: BTreeMap::new(),
        }
    }

    /// Create a schema from a flat option map
    ///
    /// `codec`, `numDataUnits` and `numParityUnits` are required; every other
    /// entry is kept as an extra option.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self> {
        let codec_name = options
            .get(CODEC_NAME_KEY)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::InvalidSchema(format!("{CODEC_NAME_KEY} is required")))?;
        let num_data_units = Self::parse_count(options, NUM_DATA_UNITS_KEY)?;
        let num_parity_units = Self::parse_count(options, NUM_PARITY_UNITS_KEY)?;

        let extra_options = options
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    CODEC_NAME_KEY | NUM_DATA_UNITS_KEY | NUM_PARITY_UNITS_KEY
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let schema = Self {
            codec_name: codec_name.trim().to_lowercase(),
            num_data_units,
            num_parity_units,
            extra_options,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn parse_count(options: &BTreeMap<String, String>, key: &str) -> Result<usize> {
        let raw = options
            .get(key)
            .ok_or_else(|| Error::InvalidSchema(format!("{key} is required")))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::InvalidSchema(format!("{key} is not a valid count: {raw}")))
    }

    /// Add a codec-specific option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_options.insert(key.into(), value.into());
        self
    }

    /// Check the scheme is usable
    pub fn validate(&self) -> Result<()> {
        if self.codec_name.is_empty() {
            return Err(Error::InvalidSchema("codec name must not be empty".into()));
        }
        if self.num_data_units == 0 {
            return Err(Error::InvalidSchema("numDataUnits must be > 0".into()));
        }
        if self.num_parity_units == 0 {
            return Err(Error::InvalidSchema("numParityUnits must be > 0".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    #[must_use]
    pub const fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    #[must_use]
    pub const fn num_parity_units(&self) -> usize {
        self.num_parity_units
    }

    /// Total number of units (k + m)
    #[must_use]
    pub const fn num_all_units(&self) -> usize {
        self.num_data_units + self.num_parity_units
    }

    #[must_use]
    pub const fn extra_options(&self) -> &BTreeMap<String, String> {
        &self.extra_options
    }

    /// Storage efficiency (k / (k + m))
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn efficiency(&self) -> f64 {
        self.num_data_units as f64 / self.num_all_units() as f64
    }

    /// Default 6+3 Reed-Solomon scheme
    #[must_use]
    pub fn rs_6_3() -> Self {
        Self::new(codec::RS, 6, 3)
    }

    /// 3+2 Reed-Solomon scheme
    #[must_use]
    pub fn rs_3_2() -> Self {
        Self::new(codec::RS, 3, 2)
    }

    /// 2+1 XOR scheme
    #[must_use]
    pub fn xor_2_1() -> Self {
        Self::new(codec::XOR, 2, 1)
    }
}

impl Default for ErasureSchema {
    fn default() -> Self {
        Self::rs_6_3()
    }
}

impl fmt::Display for ErasureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.codec_name, self.num_data_units, self.num_parity_units
        )
    }
}
