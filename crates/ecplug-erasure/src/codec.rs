//! Block-level erasure codec
//!
//! `ErasureCodec` splits a block into `k` data units, computes `m` parity
//! units, and rebuilds the block from any sufficient subset of units. The
//! coders underneath are chosen by the schema's codec name, and their raw
//! coders by the configuration.
//!
//! ```
//! use ecplug_erasure::ErasureCodec;
//! use ecplug_common::ErasureSchema;
//!
//! let codec = ErasureCodec::with_builtins(&ErasureSchema::rs_3_2()).unwrap();
//! let data = b"Hello, World!";
//! let mut units: Vec<Option<Vec<u8>>> = codec.encode(data).unwrap().into_iter().map(Some).collect();
//! units[0] = None;
//! units[4] = None;
//! assert_eq!(codec.decode(&units, data.len()).unwrap(), data);
//! ```

use crate::coder::{ErasureCoder, ErasureCoders, ErasureDecoder, ErasureEncoder};
use crate::rawcoder::{BoxError, RawCoderRegistry, RawCoderResult};
use crate::unit::ErasureUnit;
use bytes::Bytes;
use ecplug_common::{CoderConf, ErasureSchema, Error as CommonError};
use std::sync::Arc;
use thiserror::Error;

/// Minimum unit size produced by [`ErasureCodec::encode`]
pub const MIN_UNIT_SIZE: usize = 64;

/// Errors specific to erasure coding operations
#[derive(Debug, Error)]
pub enum ErasureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("insufficient units: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("unit size mismatch")]
    ShardSizeMismatch,

    #[error("failed to create raw coder factory '{factory}' bound to '{key}': {source}")]
    PluginInstantiationFailed {
        key: String,
        factory: String,
        source: BoxError,
    },

    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    #[error("coder has been released")]
    CoderReleased,
}

impl ErasureError {
    /// Whether this error comes from a misconfiguration
    ///
    /// Retrying with the same configuration fails the same way.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PluginInstantiationFailed { .. } | Self::UnknownCodec(_)
        )
    }
}

impl From<ErasureError> for CommonError {
    fn from(e: ErasureError) -> Self {
        match e {
            ErasureError::InsufficientShards {
                available,
                required,
            } => Self::InsufficientUnits {
                available,
                required,
            },
            ErasureError::UnknownCodec(name) => Self::UnknownCodec(name),
            e @ ErasureError::PluginInstantiationFailed { .. } => Self::Configuration(e.to_string()),
            e => Self::ErasureCoding(e.to_string()),
        }
    }
}

/// Erasure codec over one encoder/decoder pair
pub struct ErasureCodec {
    schema: ErasureSchema,
    encoder: Box<dyn ErasureEncoder>,
    decoder: Box<dyn ErasureDecoder>,
}

impl ErasureCodec {
    /// Create a codec for `schema`
    ///
    /// Fails immediately if the configuration binds the codec's raw coder key
    /// to a factory that cannot be constructed.
    pub fn new(
        schema: &ErasureSchema,
        conf: Option<Arc<CoderConf>>,
        registry: Arc<RawCoderRegistry>,
    ) -> RawCoderResult<Self> {
        let encoder = ErasureCoders::create_encoder(schema, conf.clone(), Arc::clone(&registry))?;
        let decoder = ErasureCoders::create_decoder(schema, conf, registry)?;

        tracing::debug!(
            %schema,
            prefer_direct_buffer = encoder.prefer_direct_buffer(),
            "Created erasure codec"
        );

        Ok(Self {
            schema: schema.clone(),
            encoder,
            decoder,
        })
    }

    /// Create a codec using only the built-in raw coders
    pub fn with_builtins(schema: &ErasureSchema) -> RawCoderResult<Self> {
        Self::new(schema, None, Arc::new(RawCoderRegistry::with_builtins()))
    }

    #[must_use]
    pub const fn schema(&self) -> &ErasureSchema {
        &self.schema
    }

    #[must_use]
    pub fn num_data_units(&self) -> usize {
        self.encoder.num_data_units()
    }

    #[must_use]
    pub fn num_parity_units(&self) -> usize {
        self.encoder.num_parity_units()
    }

    /// Total number of units (data + parity)
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.num_data_units() + self.num_parity_units()
    }

    /// Whether either coder prefers direct buffers
    #[must_use]
    pub fn prefer_direct_buffer(&self) -> bool {
        self.encoder.prefer_direct_buffer() || self.decoder.prefer_direct_buffer()
    }

    /// Release both coders; the codec is unusable afterwards
    pub fn release(&mut self) {
        self.encoder.release();
        self.decoder.release();
    }

    /// Unit size used to encode a block of `len` bytes
    ///
    /// `len / k` rounded up, at least [`MIN_UNIT_SIZE`], and even.
    #[must_use]
    pub fn unit_size_for(&self, len: usize) -> usize {
        let size = len.div_ceil(self.num_data_units()).max(MIN_UNIT_SIZE);
        size + size % 2
    }

    /// Encode a block into `k` data units followed by `m` parity units
    pub fn encode(&self, data: &[u8]) -> RawCoderResult<Vec<Vec<u8>>> {
        let k = self.num_data_units();
        let unit_size = self.unit_size_for(data.len());

        let mut padded = vec![0u8; unit_size * k];
        padded[..data.len()].copy_from_slice(data);

        let data_units: Vec<&[u8]> = padded.chunks_exact(unit_size).collect();
        let parity = self.encoder.encode(&data_units)?;

        let mut units: Vec<Vec<u8>> = Vec::with_capacity(self.total_units());
        units.extend(data_units.iter().map(|u| u.to_vec()));
        units.extend(parity);
        Ok(units)
    }

    /// Encode a block into checksummed units
    pub fn encode_units(&self, data: &[u8]) -> RawCoderResult<Vec<ErasureUnit>> {
        let k = self.num_data_units();
        Ok(self
            .encode(data)?
            .into_iter()
            .enumerate()
            .map(|(index, unit)| ErasureUnit::new(index, Bytes::from(unit), index >= k))
            .collect())
    }

    /// Check unit count, availability and sizes; returns the unit size
    fn check_units(&self, units: &[Option<Vec<u8>>]) -> RawCoderResult<usize> {
        let total = self.total_units();
        let k = self.num_data_units();

        if units.len() != total {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {} units, got {}",
                total,
                units.len()
            )));
        }

        let available = units.iter().filter(|u| u.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientShards {
                available,
                required: k,
            });
        }

        let mut sizes = units.iter().flatten().map(Vec::len);
        let unit_size = sizes.next().unwrap_or(0);
        if sizes.any(|s| s != unit_size) {
            return Err(ErasureError::ShardSizeMismatch);
        }
        Ok(unit_size)
    }

    /// Reconstruct every missing unit, data and parity
    ///
    /// Returns all `k + m` units in order.
    pub fn reconstruct(&self, units: &[Option<Vec<u8>>]) -> RawCoderResult<Vec<Vec<u8>>> {
        self.check_units(units)?;

        let erased: Vec<usize> = units
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.is_none().then_some(i))
            .collect();

        let refs: Vec<Option<&[u8]>> = units.iter().map(Option::as_deref).collect();
        let mut restored = self.decoder.decode(&refs, &erased)?.into_iter();

        units
            .iter()
            .map(|unit| match unit {
                Some(unit) => Ok(unit.clone()),
                None => restored.next().ok_or_else(|| {
                    ErasureError::DecodingFailed("decoder returned too few units".into())
                }),
            })
            .collect()
    }

    /// Decode units back to the original block
    ///
    /// `units` holds `k + m` entries, `None` for missing units. At least `k`
    /// must be present.
    pub fn decode(&self, units: &[Option<Vec<u8>>], original_size: usize) -> RawCoderResult<Vec<u8>> {
        let unit_size = self.check_units(units)?;
        let k = self.num_data_units();

        let missing_data: Vec<usize> = (0..k).filter(|&i| units[i].is_none()).collect();

        let mut output = Vec::with_capacity(k * unit_size);
        if missing_data.is_empty() {
            for unit in units.iter().take(k).flatten() {
                output.extend_from_slice(unit);
            }
        } else {
            tracing::debug!(missing = ?missing_data, "Reconstructing data units");
            let refs: Vec<Option<&[u8]>> = units.iter().map(Option::as_deref).collect();
            let mut restored = self.decoder.decode(&refs, &missing_data)?.into_iter();

            for unit in units.iter().take(k) {
                match unit {
                    Some(unit) => output.extend_from_slice(unit),
                    None => output.extend_from_slice(&restored.next().ok_or_else(|| {
                        ErasureError::DecodingFailed("decoder returned too few units".into())
                    })?),
                }
            }
        }

        if original_size > output.len() {
            return Err(ErasureError::DecodingFailed(format!(
                "original size {} exceeds decoded size {}",
                original_size,
                output.len()
            )));
        }
        output.truncate(original_size);
        Ok(output)
    }

    /// Verify that parity units are consistent with the data units
    pub fn verify(&self, units: &[Vec<u8>]) -> RawCoderResult<bool> {
        let k = self.num_data_units();

        if units.len() != self.total_units() {
            return Ok(false);
        }
        if let Some(first_len) = units.first().map(Vec::len) {
            if !units.iter().all(|u| u.len() == first_len) {
                return Ok(false);
            }
        }

        let data_units: Vec<&[u8]> = units[..k].iter().map(Vec::as_slice).collect();
        let parity = self.encoder.encode(&data_units)?;
        Ok(parity.as_slice() == &units[k..])
    }
}
