//! Checksummed erasure unit

use bytes::Bytes;

/// One encoded unit of a block, with a CRC32C over its contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErasureUnit {
    /// Position in the stripe, data units first
    pub index: usize,
    pub is_parity: bool,
    pub data: Bytes,
    pub checksum: u32,
}

impl ErasureUnit {
    #[must_use]
    pub fn new(index: usize, data: Bytes, is_parity: bool) -> Self {
        let checksum = crc32c::crc32c(&data);
        Self {
            index,
            is_parity,
            data,
            checksum,
        }
    }

    /// Create a data unit
    #[must_use]
    pub fn data(index: usize, data: Bytes) -> Self {
        Self::new(index, data, false)
    }

    /// Create a parity unit
    #[must_use]
    pub fn parity(index: usize, data: Bytes) -> Self {
        Self::new(index, data, true)
    }

    /// Check the stored checksum against the contents
    #[must_use]
    pub fn verify(&self) -> bool {
        crc32c::crc32c(&self.data) == self.checksum
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_creation() {
        let data = Bytes::from_static(b"test data");
        let unit = ErasureUnit::data(2, data.clone());

        assert_eq!(unit.index, 2);
        assert!(!unit.is_parity);
        assert_eq!(unit.data, data);
        assert_eq!(unit.size(), 9);
        assert!(unit.verify());
        assert!(ErasureUnit::parity(3, data).is_parity);
    }

    #[test]
    fn test_unit_detects_corruption() {
        let mut unit = ErasureUnit::data(0, Bytes::from_static(b"test data"));
        unit.data = Bytes::from_static(b"test dato");
        assert!(!unit.verify());
    }
}
