//! Raw erasure coder abstraction
//!
//! A raw coder performs the actual coding arithmetic for a fixed
//! (data units, parity units) pair. Raw coders are produced by a
//! [`RawErasureCoderFactory`], and factories are looked up by name in the
//! [`RawCoderRegistry`].
//!
//! # Built-in factories
//!
//! - `rs`: Reed-Solomon using `reed-solomon-simd` (SSE/AVX/NEON where available)
//! - `xor`: single parity unit, XOR of all data units

pub mod registry;
pub mod rs;
pub mod xor;

use crate::ErasureError;

/// Result type for raw coder operations
pub type RawCoderResult<T> = Result<T, ErasureError>;

/// Boxed error returned by factory constructors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which half of a factory is requested
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoderRole {
    Encode,
    Decode,
}

impl std::fmt::Display for CoderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode => write!(f, "encoder"),
            Self::Decode => write!(f, "decoder"),
        }
    }
}

/// Behavior shared by raw encoders and decoders
pub trait RawErasureCoder: Send + Sync {
    /// Implementation name, for logs and diagnostics
    fn name(&self) -> &str;

    /// Number of data units (k)
    fn num_data_units(&self) -> usize;

    /// Number of parity units (m)
    fn num_parity_units(&self) -> usize;

    /// Total number of units (k + m)
    fn num_all_units(&self) -> usize {
        self.num_data_units() + self.num_parity_units()
    }

    /// Whether this coder performs better with direct (pooled, aligned)
    /// buffers than with ordinary heap buffers. A hint only.
    fn prefer_direct_buffer(&self) -> bool {
        false
    }

    /// Release held resources. Must be idempotent.
    fn release(&mut self) {}
}

/// Raw encoder: computes parity units from data units
pub trait RawErasureEncoder: RawErasureCoder {
    /// Encode `k` equally sized data units into `m` parity units
    ///
    /// Returns only the parity units, in order.
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>>;
}

/// Raw decoder: reconstructs erased units from the surviving ones
pub trait RawErasureDecoder: RawErasureCoder {
    /// Reconstruct erased units
    ///
    /// # Arguments
    /// * `units` - `k + m` optional units, `None` for missing
    /// * `erased` - indices of the units to reconstruct; a unit listed here
    ///   is treated as missing even if it was supplied
    ///
    /// # Returns
    /// Reconstructed units in the order given by `erased`
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>>;
}

/// Factory producing raw encoders and decoders
///
/// Implementations are registered in a [`RawCoderRegistry`] under a name and
/// must be constructible without arguments.
pub trait RawErasureCoderFactory: Send + Sync {
    /// Factory name
    fn name(&self) -> &str;

    /// Create an encoder for the given unit counts
    fn create_encoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureEncoder>>;

    /// Create a decoder for the given unit counts
    fn create_decoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureDecoder>>;
}

/// A resolved raw coder, encoder or decoder
pub enum RawCoder {
    Encoder(Box<dyn RawErasureEncoder>),
    Decoder(Box<dyn RawErasureDecoder>),
}

impl RawCoder {
    /// Role of this coder
    #[must_use]
    pub const fn role(&self) -> CoderRole {
        match self {
            Self::Encoder(_) => CoderRole::Encode,
            Self::Decoder(_) => CoderRole::Decode,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Encoder(e) => e.name(),
            Self::Decoder(d) => d.name(),
        }
    }

    #[must_use]
    pub fn num_data_units(&self) -> usize {
        match self {
            Self::Encoder(e) => e.num_data_units(),
            Self::Decoder(d) => d.num_data_units(),
        }
    }

    #[must_use]
    pub fn num_parity_units(&self) -> usize {
        match self {
            Self::Encoder(e) => e.num_parity_units(),
            Self::Decoder(d) => d.num_parity_units(),
        }
    }

    #[must_use]
    pub fn prefer_direct_buffer(&self) -> bool {
        match self {
            Self::Encoder(e) => e.prefer_direct_buffer(),
            Self::Decoder(d) => d.prefer_direct_buffer(),
        }
    }

    pub fn release(&mut self) {
        match self {
            Self::Encoder(e) => e.release(),
            Self::Decoder(d) => d.release(),
        }
    }

    /// Take the encoder, or `None` if this is a decoder
    #[must_use]
    pub fn into_encoder(self) -> Option<Box<dyn RawErasureEncoder>> {
        match self {
            Self::Encoder(e) => Some(e),
            Self::Decoder(_) => None,
        }
    }

    /// Take the decoder, or `None` if this is an encoder
    #[must_use]
    pub fn into_decoder(self) -> Option<Box<dyn RawErasureDecoder>> {
        match self {
            Self::Decoder(d) => Some(d),
            Self::Encoder(_) => None,
        }
    }
}

impl std::fmt::Debug for RawCoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCoder")
            .field("role", &self.role())
            .field("name", &self.name())
            .field("num_data_units", &self.num_data_units())
            .field("num_parity_units", &self.num_parity_units())
            .finish()
    }
}

/// Validate encoder inputs, returning the unit size
pub(crate) fn check_encode_inputs(
    coder: &dyn RawErasureCoder,
    data_units: &[&[u8]],
) -> RawCoderResult<usize> {
    let k = coder.num_data_units();
    if data_units.len() != k {
        return Err(ErasureError::InvalidConfig(format!(
            "expected {} data units, got {}",
            k,
            data_units.len()
        )));
    }

    let unit_size = data_units.first().map_or(0, |u| u.len());
    if data_units.iter().any(|u| u.len() != unit_size) {
        return Err(ErasureError::ShardSizeMismatch);
    }
    Ok(unit_size)
}

/// Validate decoder inputs, returning the unit size of the surviving units
pub(crate) fn check_decode_inputs(
    coder: &dyn RawErasureCoder,
    units: &[Option<&[u8]>],
    erased: &[usize],
) -> RawCoderResult<usize> {
    let total = coder.num_all_units();
    if units.len() != total {
        return Err(ErasureError::InvalidConfig(format!(
            "expected {} units, got {}",
            total,
            units.len()
        )));
    }
    if let Some(&bad) = erased.iter().find(|&&i| i >= total) {
        return Err(ErasureError::InvalidConfig(format!(
            "erased index {bad} out of range (total units {total})"
        )));
    }

    let mut surviving = surviving_units(units, erased);
    let unit_size = surviving.next().map_or(0, |(_, u)| u.len());
    if surviving.any(|(_, u)| u.len() != unit_size) {
        return Err(ErasureError::ShardSizeMismatch);
    }
    Ok(unit_size)
}

/// Units that are present and not listed as erased
pub(crate) fn surviving_units<'a>(
    units: &'a [Option<&'a [u8]>],
    erased: &'a [usize],
) -> impl Iterator<Item = (usize, &'a [u8])> + 'a {
    units
        .iter()
        .enumerate()
        .filter(move |(i, _)| !erased.contains(i))
        .filter_map(|(i, u)| u.map(|u| (i, u)))
}

// Re-exports
pub use registry::{FactoryConstructor, RawCoderRegistry};
pub use rs::{RsRawDecoder, RsRawEncoder, RsRawErasureCoderFactory};
pub use xor::{XorRawDecoder, XorRawEncoder, XorRawErasureCoderFactory};
