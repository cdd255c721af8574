//! Reed-Solomon raw coders using reed-solomon-simd
//!
//! The `reed-solomon-simd` crate picks SIMD instructions at runtime where
//! available (SSE, AVX, NEON). Each raw coder keeps one engine instance and
//! resets it per call, so the working buffers are reused across calls until
//! [`RawErasureCoder::release`] drops them.

use super::{
    RawCoderResult, RawErasureCoder, RawErasureCoderFactory, RawErasureDecoder,
    RawErasureEncoder, check_decode_inputs, check_encode_inputs, surviving_units,
};
use crate::ErasureError;
use parking_lot::Mutex;
use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};

/// Maximum total units supported by the Reed-Solomon raw coders
pub const MAX_RS_UNITS: usize = 255;

fn check_counts(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<()> {
    if num_data_units == 0 {
        return Err(ErasureError::InvalidConfig(
            "num_data_units must be > 0".into(),
        ));
    }
    if num_parity_units == 0 {
        return Err(ErasureError::InvalidConfig(
            "num_parity_units must be > 0".into(),
        ));
    }
    if num_data_units + num_parity_units > MAX_RS_UNITS {
        return Err(ErasureError::InvalidConfig(format!(
            "total units must be <= {MAX_RS_UNITS}"
        )));
    }
    Ok(())
}

fn check_unit_size(unit_size: usize) -> RawCoderResult<()> {
    if unit_size == 0 || unit_size % 2 != 0 {
        return Err(ErasureError::InvalidConfig(format!(
            "unit size must be a non-zero even number of bytes, got {unit_size}"
        )));
    }
    Ok(())
}

/// Reed-Solomon raw encoder
pub struct RsRawEncoder {
    num_data_units: usize,
    num_parity_units: usize,
    engine: Mutex<Option<ReedSolomonEncoder>>,
    released: bool,
}

impl RsRawEncoder {
    /// Create a new encoder
    pub fn new(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<Self> {
        check_counts(num_data_units, num_parity_units)?;
        Ok(Self {
            num_data_units,
            num_parity_units,
            engine: Mutex::new(None),
            released: false,
        })
    }

    /// Whether [`RawErasureCoder::release`] has been called
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl RawErasureCoder for RsRawEncoder {
    fn name(&self) -> &str {
        "rs"
    }

    fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    fn num_parity_units(&self) -> usize {
        self.num_parity_units
    }

    fn prefer_direct_buffer(&self) -> bool {
        true
    }

    fn release(&mut self) {
        self.released = true;
        self.engine.get_mut().take();
    }
}

impl RawErasureEncoder for RsRawEncoder {
    fn encode(&self, data_units: &[&[u8]]) -> RawCoderResult<Vec<Vec<u8>>> {
        if self.released {
            return Err(ErasureError::CoderReleased);
        }
        let unit_size = check_encode_inputs(self, data_units)?;
        check_unit_size(unit_size)?;

        let k = self.num_data_units;
        let m = self.num_parity_units;

        let mut guard = self.engine.lock();
        let engine = match guard.take() {
            Some(mut engine) => {
                engine
                    .reset(k, m, unit_size)
                    .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
                engine
            }
            None => ReedSolomonEncoder::new(k, m, unit_size)
                .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?,
        };
        let engine = guard.insert(engine);

        for unit in data_units {
            engine
                .add_original_shard(unit)
                .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        }

        let result = engine
            .encode()
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;

        Ok(result.recovery_iter().map(<[u8]>::to_vec).collect())
    }
}

/// Reed-Solomon raw decoder
///
/// Erased data units are restored through the RS decoder; erased parity
/// units are recomputed from the (restored) data units.
pub struct RsRawDecoder {
    num_data_units: usize,
    num_parity_units: usize,
    engine: Mutex<Option<ReedSolomonDecoder>>,
    encoder: RsRawEncoder,
    released: bool,
}

impl RsRawDecoder {
    /// Create a new decoder
    pub fn new(num_data_units: usize, num_parity_units: usize) -> RawCoderResult<Self> {
        let encoder = RsRawEncoder::new(num_data_units, num_parity_units)?;
        Ok(Self {
            num_data_units,
            num_parity_units,
            engine: Mutex::new(None),
            encoder,
            released: false,
        })
    }

    /// Restore every data unit, original or reconstructed
    fn restore_data_units(
        &self,
        units: &[Option<&[u8]>],
        erased: &[usize],
        unit_size: usize,
    ) -> RawCoderResult<Vec<Vec<u8>>> {
        let k = self.num_data_units;
        let m = self.num_parity_units;

        let mut data: Vec<Option<Vec<u8>>> = vec![None; k];
        for (i, unit) in surviving_units(units, erased).filter(|(i, _)| *i < k) {
            data[i] = Some(unit.to_vec());
        }

        if data.iter().any(Option::is_none) {
            let mut guard = self.engine.lock();
            let engine = match guard.take() {
                Some(mut engine) => {
                    engine
                        .reset(k, m, unit_size)
                        .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
                    engine
                }
                None => ReedSolomonDecoder::new(k, m, unit_size)
                    .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?,
            };
            let engine = guard.insert(engine);

            for (i, unit) in surviving_units(units, erased) {
                let added = if i < k {
                    engine.add_original_shard(i, unit)
                } else {
                    engine.add_recovery_shard(i - k, unit)
                };
                added.map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
            }

            let result = engine
                .decode()
                .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;

            for (i, slot) in data.iter_mut().enumerate() {
                if slot.is_none() {
                    let restored = result.restored_original(i).ok_or_else(|| {
                        ErasureError::DecodingFailed(format!("failed to restore data unit {i}"))
                    })?;
                    *slot = Some(restored.to_vec());
                }
            }
        }

        Ok(data.into_iter().flatten().collect())
    }
}

impl RawErasureCoder for RsRawDecoder {
    fn name(&self) -> &str {
        "rs"
    }

    fn num_data_units(&self) -> usize {
        self.num_data_units
    }

    fn num_parity_units(&self) -> usize {
        self.num_parity_units
    }

    fn prefer_direct_buffer(&self) -> bool {
        true
    }

    fn release(&mut self) {
        self.released = true;
        self.engine.get_mut().take();
        self.encoder.release();
    }
}

impl RawErasureDecoder for RsRawDecoder {
    fn decode(&self, units: &[Option<&[u8]>], erased: &[usize]) -> RawCoderResult<Vec<Vec<u8>>> {
        if self.released {
            return Err(ErasureError::CoderReleased);
        }
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
        check_unit_size(unit_size)?;

        let data = self.restore_data_units(units, erased, unit_size)?;

        let parity = if erased.iter().any(|&i| i >= k) {
            let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
            self.encoder.encode(&refs)?
        } else {
            Vec::new()
        };

        Ok(erased
            .iter()
            .map(|&i| if i < k { data[i].clone() } else { parity[i - k].clone() })
            .collect())
    }
}

/// Factory for the built-in Reed-Solomon raw coders
#[derive(Clone, Copy, Debug, Default)]
pub struct RsRawErasureCoderFactory;

impl RsRawErasureCoderFactory {
    /// Registry name
    pub const NAME: &'static str = "rs";
}

impl RawErasureCoderFactory for RsRawErasureCoderFactory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_encoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureEncoder>> {
        Ok(Box::new(RsRawEncoder::new(num_data_units, num_parity_units)?))
    }

    fn create_decoder(
        &self,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Box<dyn RawErasureDecoder>> {
        Ok(Box::new(RsRawDecoder::new(num_data_units, num_parity_units)?))
    }
}
