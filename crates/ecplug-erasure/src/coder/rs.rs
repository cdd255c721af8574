//! Reed-Solomon erasure coders
//!
//! The raw coder is taken from the key `io.erasurecode.codec.rs.rawcoder`
//! when one is configured, otherwise the built-in `rs` raw coder is used.

use super::{CoderBase, ErasureCoder, ErasureDecoder, ErasureEncoder};
use crate::ErasureError;
use crate::rawcoder::{
    RawCoderResult, RawErasureCoder, RawErasureDecoder, RawErasureEncoder,
    RsRawErasureCoderFactory,
};
use ecplug_common::keys::RS_RAWCODER_KEY;

/// Reed-Solomon encoder
pub struct RsErasureEncoder {
    base: CoderBase,
    raw: Option<Box<dyn RawErasureEncoder>>,
}

impl RsErasureEncoder {
    /// Create the encoder, resolving its raw coder once
    pub fn new(base: CoderBase) -> RawCoderResult<Self> {
        let raw = base.raw_encoder_or(RS_RAWCODER_KEY, &RsRawErasureCoderFactory)?;
        Ok(Self {
            base,
            raw: Some(raw),
        })
    }

    /// Name of the raw coder in use, `None` once released
    #[must_use]
    pub fn raw_coder_name(&self) -> Option<&str> {
        self.raw.as_deref().map(|raw| raw.name())
    }
}

impl ErasureCoder for RsErasureEncoder {
    fn base(&self) -> &CoderBase {
        &self.base
    }

    fn prefer_direct_buffer(&self) -> bool {
        self.raw.as_ref().is_some_and(|raw| raw.prefer_direct_buffer())
    }

    fn release(&mut self) {
        if let Some(mut raw) = self.raw.take() {
            raw.release();
        }
    }
}

impl ErasureEncoder for RsErasureEncoder {
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>> {
        self.raw
            .as_ref()
            .ok_or(ErasureError::CoderReleased)?
            .encode(data_units)
    }
}

/// Reed-Solomon decoder
pub struct RsErasureDecoder {
    base: CoderBase,
    raw: Option<Box<dyn RawErasureDecoder>>,
}

impl RsErasureDecoder {
    /// Create the decoder, resolving its raw coder once
    pub fn new(base: CoderBase) -> RawCoderResult<Self> {
        let raw = base.raw_decoder_or(RS_RAWCODER_KEY, &RsRawErasureCoderFactory)?;
        Ok(Self {
            base,
            raw: Some(raw),
        })
    }

    #[must_use]
    pub fn raw_coder_name(&self) -> Option<&str> {
        self.raw.as_deref().map(|raw| raw.name())
    }
}

impl ErasureCoder for RsErasureDecoder {
    fn base(&self) -> &CoderBase {
        &self.base
    }

    fn prefer_direct_buffer(&self) -> bool {
        self.raw.as_ref().is_some_and(|raw| raw.prefer_direct_buffer())
    }

    fn release(&mut self) {
        if let Some(mut raw) = self.raw.take() {
            raw.release();
        }
    }
}

impl ErasureDecoder for RsErasureDecoder {
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>> {
        self.raw
            .as_ref()
            .ok_or(ErasureError::CoderReleased)?
            .decode(units, erased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::CoderOptions;
    use crate::rawcoder::{RawCoderRegistry, XorRawErasureCoderFactory};
    use ecplug_common::CoderConf;
    use std::sync::Arc;

    fn base(d: usize, p: usize, conf: Option<CoderConf>) -> CoderBase {
        CoderBase::new(
            CoderOptions::new(d, p),
            conf.map(Arc::new),
            Arc::new(RawCoderRegistry::with_builtins()),
        )
    }

    #[test]
    fn test_falls_back_to_builtin() {
        let encoder = RsErasureEncoder::new(base(6, 3, None)).unwrap();
        assert_eq!(encoder.raw_coder_name(), Some("rs"));
        assert!(encoder.prefer_direct_buffer());

        let decoder = RsErasureDecoder::new(base(6, 3, Some(CoderConf::new()))).unwrap();
        assert_eq!(decoder.raw_coder_name(), Some("rs"));
    }

    #[test]
    fn test_uses_configured_plugin() {
        let mut registry = RawCoderRegistry::with_builtins();
        registry.register_default::<XorRawErasureCoderFactory>("fast-xor");
        let conf = CoderConf::new().with(RS_RAWCODER_KEY, "fast-xor");
        let base = CoderBase::new(
            CoderOptions::new(4, 1),
            Some(Arc::new(conf)),
            Arc::new(registry),
        );

        let encoder = RsErasureEncoder::new(base).unwrap();
        assert_eq!(encoder.raw_coder_name(), Some("xor"));
        assert!(!encoder.prefer_direct_buffer());
    }

    #[test]
    fn test_misconfigured_plugin_fails_construction() {
        let conf = CoderConf::new().with(RS_RAWCODER_KEY, "missing");
        assert!(matches!(
            RsErasureEncoder::new(base(6, 3, Some(conf.clone()))),
            Err(ErasureError::PluginInstantiationFailed { .. })
        ));
        assert!(matches!(
            RsErasureDecoder::new(base(6, 3, Some(conf))),
            Err(ErasureError::PluginInstantiationFailed { .. })
        ));
    }

    #[test]
    fn test_encode_decode() {
        let encoder = RsErasureEncoder::new(base(3, 2, None)).unwrap();
        let decoder = RsErasureDecoder::new(base(3, 2, None)).unwrap();

        let data: Vec<Vec<u8>> = (0..3).map(|i| vec![i as u8 + 1; 128]).collect();
        let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let parity = encoder.encode(&refs).unwrap();
        assert_eq!(parity.len(), 2);

        let units = [None, Some(refs[1]), None, Some(&parity[0][..]), Some(&parity[1][..])];
        let restored = decoder.decode(&units, &[0, 2]).unwrap();
        assert_eq!(restored, vec![data[0].clone(), data[2].clone()]);
    }

    #[test]
    fn test_release() {
        let mut encoder = RsErasureEncoder::new(base(2, 1, None)).unwrap();
        encoder.release();
        encoder.release();

        assert_eq!(encoder.raw_coder_name(), None);
        assert!(!encoder.prefer_direct_buffer());
        assert_eq!(encoder.num_data_units(), 2);

        let a = [0u8; 64];
        assert!(matches!(
            encoder.encode(&[&a, &a]),
            Err(ErasureError::CoderReleased)
        ));

        let mut decoder = RsErasureDecoder::new(base(2, 1, None)).unwrap();
        decoder.release();
        decoder.release();
        assert!(matches!(
            decoder.decode(&[Some(&a[..]), Some(&a[..]), None], &[2]),
            Err(ErasureError::CoderReleased)
        ));
    }
}
