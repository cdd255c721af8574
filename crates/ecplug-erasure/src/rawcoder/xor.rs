//! XOR raw coders
//!
//! A single parity unit holding the XOR of all data units. Any one missing
//! unit is the XOR of all the others.

use super::{
    RawCoderResult, RawErasureCoder, RawErasureCoderFactory, RawErasureDecoder,
    RawErasureEncoder, check_decode_inputs, check_encode_inputs, surviving_units,
};
use crate::ErasureError;

fn check_counts(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<()> {
    if num_data_units == 0 {
        return Err(ErasureError::InvalidConfig(
            "num_data_units must be > 0".into(),
        ));
    }
    if num_parity_units != 1 {
        return Err(ErasureError::InvalidConfig(format!(
            "xor supports exactly one parity unit, got {num_parity_units}"
        )));
    }
    Ok(())
}

/// XOR all slices together
fn xor_slices<'a>(slices: impl IntoIterator<Item = &'a [u8]>, unit_size: usize) -> Vec<u8> {
    let mut result = vec![0u8; unit_size];
    for slice in slices {
        for (out, byte) in result.iter_mut().zip(slice) {
            *out ^= byte;
        }
    }
    result
}

/// XOR raw encoder
#[derive(Debug)]
pub struct XorRawEncoder {
    num_data_units: usize,
}

impl XorRawEncoder {
    pub fn new(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<Self> {
        check_counts(num_data_units, num_parity_units)?;
        Ok(Self { num_data_units })
    }
}

impl RawErasureCoder for XorRawEncoder {
    fn name(&self) -> &str {
        "xor"
    }

    fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    fn num_parity_units(&self) -> usize {
        1
    }
}

impl RawErasureEncoder for XorRawEncoder {
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>> {
        let unit_size = check_encode_inputs(self, data_units)?;
        Ok(vec![xor_slices(data_units.iter().copied(), unit_size)])
    }
}

/// XOR raw decoder
#[derive(Debug)]
pub struct XorRawDecoder {
    num_data_units: usize,
}

impl XorRawDecoder {
    pub fn new(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<Self> {
        check_counts(num_data_units, num_parity_units)?;
        Ok(Self { num_data_units })
    }
}

impl RawErasureCoder for XorRawDecoder {
    fn name(&self) -> &str {
        "xor"
    }

    fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    fn num_parity_units(&self) -> usize {
        1
    }
}

impl RawErasureDecoder for XorRawDecoder {
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>> {
        let unit_size = check_decode_inputs(self, units, erased)?;

        let k = self.num_data_units;
        let available = surviving_units(units, erased).count();
        if available < k {
            return Err(ErasureError::InsufficientShards {
                available,
                required: k,
            });
        }
        if erased.is_empty() {
            return Ok(Vec::new());
        }

        // With all k + 1 units surviving, any one of them is still the XOR of
        // the rest, so the first k survivors are enough.
        let restored = xor_slices(
            surviving_units(units, erased).take(k).map(|(_, u)| u),
            unit_size,
        );
        Ok(erased.iter().map(|_| restored.clone()).collect())
    }
}

/// Factory for the built-in XOR raw coders
#[derive(Clone, Copy, Debug, Default)]
pub struct XorRawErasureCoderFactory;

impl XorRawErasureCoderFactory {
    /// Registry name
    pub const NAME: &'static str = "xor";
}

impl RawErasureCoderFactory for XorRawErasureCoderFactory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_encoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureEncoder>> {
        Ok(Box::new(XorRawEncoder::new(num_data_units, num_parity_units)?))
    }

    fn create_decoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureDecoder>> {
        Ok(Box::new(XorRawDecoder::new(num_data_units, num_parity_units)?))
    }
}
