//! XOR erasure coders
//!
//! The raw coder is taken from the key `io.erasurecode.codec.xor.rawcoder`
//! when one is configured, otherwise the built-in `xor` raw coder is used.

use super::{CoderBase, ErasureCoder, ErasureDecoder, ErasureEncoder};
use crate::ErasureError;
use crate::rawcoder::{
    RawCoderResult, RawErasureCoder, RawErasureDecoder, RawErasureEncoder,
    XorRawErasureCoderFactory,
};
use ecplug_common::keys::XOR_RAWCODER_KEY;

/// XOR encoder
pub struct XorErasureEncoder {
    base: CoderBase,
    raw: Option<Box<dyn RawErasureEncoder>>,
}

impl XorErasureEncoder {
    /// Create the encoder, resolving its raw coder once
    pub fn new(base: CoderBase) -> RawCoderResult<Self> {
        let raw = base.raw_encoder_or(XOR_RAWCODER_KEY, &XorRawErasureCoderFactory)?;
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

impl ErasureCoder for XorErasureEncoder {
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

impl ErasureEncoder for XorErasureEncoder {
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>> {
        self.raw
            .as_ref()
            .ok_or(ErasureError::CoderReleased)?
            .encode(data_units)
    }
}

/// XOR decoder
pub struct XorErasureDecoder {
    base: CoderBase,
    raw: Option<Box<dyn RawErasureDecoder>>,
}

impl XorErasureDecoder {
    /// Create the decoder, resolving its raw coder once
    pub fn new(base: CoderBase) -> RawCoderResult<Self> {
        let raw = base.raw_decoder_or(XOR_RAWCODER_KEY, &XorRawErasureCoderFactory)?;
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

impl ErasureCoder for XorErasureDecoder {
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

impl ErasureDecoder for XorErasureDecoder {
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>> {
        self.raw
            .as_ref()
            .ok_or(ErasureError::CoderReleased)?
            .decode(units, erased)
    }
}
