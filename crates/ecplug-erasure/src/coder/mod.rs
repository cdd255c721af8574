//! Erasure coders
//!
//! A coder is the high-level object a storage system holds to encode a block
//! into data and parity units, or to reconstruct missing units. Every coder
//! embeds a [`CoderBase`], which fixes its unit counts and knows how to obtain
//! a raw coder from the [`RawCoderRegistry`] using the coder's configuration.
//!
//! The [`ErasureCoder`] trait carries the shared contract. Only
//! [`ErasureCoder::base`] is required; unit counts, buffer preference and
//! release have default bodies that implementations override as needed.

pub mod rs;
pub mod xor;

pub use rs::{RsErasureDecoder, RsErasureEncoder};
pub use xor::{XorErasureDecoder, XorErasureEncoder};

use crate::ErasureError;
use crate::rawcoder::{
    CoderRole, RawCoderRegistry, RawCoderResult, RawErasureCoderFactory, RawErasureDecoder,
    RawErasureEncoder,
};
use ecplug_common::{CoderConf, ErasureSchema, codec};
use std::sync::Arc;

/// Unit counts of a coder, fixed at construction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoderOptions {
    num_data_units: usize,
    num_parity_units: usize,
}

impl CoderOptions {
    #[must_use]
    pub const fn new(num_data_units: usize, num_parity_units: usize) -> Self {
        Self {
            num_data_units,
            num_parity_units,
        }
    }

    #[must_use]
    pub const fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    #[must_use]
    pub const fn num_parity_units(&self) -> usize {
        self.num_parity_units
    }

    #[must_use]
    pub const fn num_all_units(&self) -> usize {
        self.num_data_units + self.num_parity_units
    }
}

impl From<&ErasureSchema> for CoderOptions {
    fn from(schema: &ErasureSchema) -> Self {
        Self::new(schema.num_data_units(), schema.num_parity_units())
    }
}

/// State and helpers shared by every coder
#[derive(Clone, Debug)]
pub struct CoderBase {
    options: CoderOptions,
    conf: Option<Arc<CoderConf>>,
    registry: Arc<RawCoderRegistry>,
}

impl CoderBase {
    pub const fn new(
        options: CoderOptions,
        conf: Option<Arc<CoderConf>>,
        registry: Arc<RawCoderRegistry>,
    ) -> Self {
        Self {
            options,
            conf,
            registry,
        }
    }

    /// Take the unit counts from a redundancy scheme
    ///
    /// The scheme is trusted as given; validate it beforehand if needed.
    pub fn from_schema(
        schema: &ErasureSchema,
        conf: Option<Arc<CoderConf>>,
        registry: Arc<RawCoderRegistry>,
    ) -> Self {
        Self::new(CoderOptions::from(schema), conf, registry)
    }

    #[must_use]
    pub const fn options(&self) -> CoderOptions {
        self.options
    }

    #[must_use]
    pub const fn num_data_units(&self) -> usize {
        self.options.num_data_units()
    }

    #[must_use]
    pub const fn num_parity_units(&self) -> usize {
        self.options.num_parity_units()
    }

    #[must_use]
    pub fn conf(&self) -> Option<&CoderConf> {
        self.conf.as_deref()
    }

    #[must_use]
    pub fn registry(&self) -> &RawCoderRegistry {
        &self.registry
    }

    /// Resolve the raw encoder bound to `key`, sized to this coder's units
    pub fn create_raw_encoder(
        &self,
        key: &str,
    ) -> RawCoderResult<Option<Box<dyn RawErasureEncoder>>> {
        self.registry.resolve_encoder(
            self.conf(),
            key,
            self.num_data_units(),
            self.num_parity_units(),
        )
    }

    /// Resolve the raw decoder bound to `key`, sized to this coder's units
    pub fn create_raw_decoder(
        &self,
        key: &str,
    ) -> RawCoderResult<Option<Box<dyn RawErasureDecoder>>> {
        self.registry.resolve_decoder(
            self.conf(),
            key,
            self.num_data_units(),
            self.num_parity_units(),
        )
    }

    /// Resolve the encoder bound to `key`, or build one from `fallback`
    pub(crate) fn raw_encoder_or(
        &self,
        key: &str,
        fallback: &dyn RawErasureCoderFactory,
    ) -> RawCoderResult<Box<dyn RawErasureEncoder>> {
        match self.create_raw_encoder(key)? {
            Some(raw) => Ok(raw),
            None => {
                tracing::debug!(
                    key,
                    fallback = fallback.name(),
                    role = %CoderRole::Encode,
                    "Using built-in raw coder"
                );
                fallback.create_encoder(self.num_data_units(), self.num_parity_units())
            }
        }
    }

    /// Resolve the decoder bound to `key`, or build one from `fallback`
    pub(crate) fn raw_decoder_or(
        &self,
        key: &str,
        fallback: &dyn RawErasureCoderFactory,
    ) -> RawCoderResult<Box<dyn RawErasureDecoder>> {
        match self.create_raw_decoder(key)? {
            Some(raw) => Ok(raw),
            None => {
                tracing::debug!(
                    key,
                    fallback = fallback.name(),
                    role = %CoderRole::Decode,
                    "Using built-in raw coder"
                );
                fallback.create_decoder(self.num_data_units(), self.num_parity_units())
            }
        }
    }
}

/// Contract shared by every erasure encoder and decoder
pub trait ErasureCoder: Send + Sync {
    /// The embedded shared state
    fn base(&self) -> &CoderBase;

    /// Number of data units (k)
    fn num_data_units(&self) -> usize {
        self.base().num_data_units()
    }

    /// Number of parity units (m)
    fn num_parity_units(&self) -> usize {
        self.base().num_parity_units()
    }

    /// Whether this coder prefers direct buffers. A performance hint, not a
    /// requirement.
    fn prefer_direct_buffer(&self) -> bool {
        false
    }

    /// Release held resources
    ///
    /// Safe to call any number of times; never fails.
    fn release(&mut self) {}
}

/// An erasure coder that computes parity units
pub trait ErasureEncoder: ErasureCoder {
    /// Encode `k` equally sized data units, returning the `m` parity units
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>>;
}

/// An erasure coder that reconstructs missing units
pub trait ErasureDecoder: ErasureCoder {
    /// Reconstruct the units listed in `erased`, in that order
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>>;
}

/// Creates concrete coders from a redundancy scheme
pub struct ErasureCoders;

impl ErasureCoders {
    /// Create the encoder for the scheme's codec
    pub fn create_encoder(
        schema: &ErasureSchema,
        conf: Option<Arc<CoderConf>>,
        registry: Arc<RawCoderRegistry>,
    ) -> RawCoderResult<Box<dyn ErasureEncoder>> {
        schema
            .validate()
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        let base = CoderBase::from_schema(schema, conf, registry);

        match schema.codec_name() {
            codec::RS => Ok(Box::new(rs::RsErasureEncoder::new(base)?)),
            codec::XOR => Ok(Box::new(xor::XorErasureEncoder::new(base)?)),
            other => Err(ErasureError::UnknownCodec(other.to_string())),
        }
    }

    /// Create the decoder for the scheme's codec
    pub fn create_decoder(
        schema: &ErasureSchema,
        conf: Option<Arc<CoderConf>>,
        registry: Arc<RawCoderRegistry>,
    ) -> RawCoderResult<Box<dyn ErasureDecoder>> {
        schema
            .validate()
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        let base = CoderBase::from_schema(schema, conf, registry);

        match schema.codec_name() {
            codec::RS => Ok(Box::new(rs::RsErasureDecoder::new(base)?)),
            codec::XOR => Ok(Box::new(xor::XorErasureDecoder::new(base)?)),
            other => Err(ErasureError::UnknownCodec(other.to_string())),
        }
    }

    /// Codec names with a built-in coder
    #[must_use]
    pub const fn supported_codecs() -> &'static [&'static str] {
        &[codec::RS, codec::XOR]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rawcoder::{BoxError, RawErasureCoder};
    use ecplug_common::keys;
    use rand::Rng;

    /// A coder that relies on every default body
    struct BareCoder {
        base: CoderBase,
    }

    impl ErasureCoder for BareCoder {
        fn base(&self) -> &CoderBase {
            &self.base
        }
    }

    /// A coder that advertises a direct buffer preference
    struct DirectCoder {
        base: CoderBase,
        released: usize,
    }

    impl ErasureCoder for DirectCoder {
        fn base(&self) -> &CoderBase {
            &self.base
        }

        fn prefer_direct_buffer(&self) -> bool {
            true
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    fn registry() -> Arc<RawCoderRegistry> {
        fn broken() -> Result<Box<dyn RawErasureCoderFactory>, BoxError> {
            Err("native library not loaded".into())
        }
        let mut registry = RawCoderRegistry::with_builtins();
        registry.register("broken", broken);
        Arc::new(registry)
    }

    fn base(d: usize, p: usize, conf: Option<CoderConf>) -> CoderBase {
        CoderBase::new(CoderOptions::new(d, p), conf.map(Arc::new), registry())
    }

    #[test]
    fn test_options_from_schema_match_direct() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let d = rng.gen_range(0..=255);
            let p = rng.gen_range(0..=255);
            let schema = ErasureSchema::new("rs", d, p);

            let direct = CoderBase::new(CoderOptions::new(d, p), None, registry());
            let derived = CoderBase::from_schema(&schema, None, registry());

            assert_eq!(direct.num_data_units(), derived.num_data_units());
            assert_eq!(direct.num_parity_units(), derived.num_parity_units());
            assert_eq!(direct.options(), derived.options());
            assert_eq!(derived.options().num_all_units(), d + p);
        }
    }

    #[test]
    fn test_default_capabilities() {
        let mut coder = BareCoder {
            base: base(6, 3, None),
        };
        assert_eq!(coder.num_data_units(), 6);
        assert_eq!(coder.num_parity_units(), 3);
        assert!(!coder.prefer_direct_buffer());

        coder.release();
        coder.release();
        coder.release();
        assert_eq!(coder.num_data_units(), 6);
    }

    #[test]
    fn test_overrides_pass_through() {
        let mut coder = DirectCoder {
            base: base(4, 2, None),
            released: 0,
        };
        assert!(coder.prefer_direct_buffer());

        let as_trait: &mut dyn ErasureCoder = &mut coder;
        as_trait.release();
        as_trait.release();
        assert!(as_trait.prefer_direct_buffer());
        assert_eq!(coder.released, 2);
    }

    #[test]
    fn test_create_raw_coders_without_conf() {
        let base = base(6, 3, None);
        assert!(base.conf().is_none());
        assert!(base.create_raw_encoder(keys::RS_RAWCODER_KEY).unwrap().is_none());
        assert!(base.create_raw_decoder(keys::RS_RAWCODER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_create_raw_coders_uses_stored_counts() {
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");
        let base = base(10, 4, Some(conf));

        let encoder = base.create_raw_encoder(keys::RS_RAWCODER_KEY).unwrap().unwrap();
        assert_eq!(encoder.num_data_units(), 10);
        assert_eq!(encoder.num_parity_units(), 4);

        let decoder = base.create_raw_decoder(keys::RS_RAWCODER_KEY).unwrap().unwrap();
        assert_eq!(decoder.num_data_units(), 10);
        assert_eq!(decoder.num_parity_units(), 4);
    }

    #[test]
    fn test_create_raw_coder_broken_plugin() {
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "broken");
        let base = base(6, 3, Some(conf));

        assert!(matches!(
            base.create_raw_encoder(keys::RS_RAWCODER_KEY),
            Err(ErasureError::PluginInstantiationFailed { .. })
        ));
        assert!(matches!(
            base.raw_decoder_or(keys::RS_RAWCODER_KEY, &crate::RsRawErasureCoderFactory),
            Err(ErasureError::PluginInstantiationFailed { .. })
        ));
    }

    #[test]
    fn test_coders_from_schema() {
        let encoder =
            ErasureCoders::create_encoder(&ErasureSchema::rs_6_3(), None, registry()).unwrap();
        assert_eq!(encoder.num_data_units(), 6);
        assert_eq!(encoder.num_parity_units(), 3);

        let decoder =
            ErasureCoders::create_decoder(&ErasureSchema::xor_2_1(), None, registry()).unwrap();
        assert_eq!(decoder.num_data_units(), 2);
        assert_eq!(decoder.num_parity_units(), 1);
    }

    #[test]
    fn test_coders_reject_bad_schema() {
        let lrc = ErasureSchema::new("lrc", 6, 4);
        assert!(matches!(
            ErasureCoders::create_encoder(&lrc, None, registry()),
            Err(ErasureError::UnknownCodec(_))
        ));

        let empty = ErasureSchema::new("rs", 0, 3);
        assert!(matches!(
            ErasureCoders::create_decoder(&empty, None, registry()),
            Err(ErasureError::InvalidConfig(_))
        ));
    }
}
