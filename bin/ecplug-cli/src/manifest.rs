//! Stripe manifest written next to encoded units

use anyhow::{Context, Result, bail};
use ecplug_common::ErasureSchema;
use ecplug_erasure::ErasureUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.toml";

/// File name of unit `index` inside a stripe directory
pub fn unit_file_name(index: usize) -> String {
    format!("unit-{index}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub codec: String,
    pub num_data_units: usize,
    pub num_parity_units: usize,
    pub original_size: usize,
    pub unit_size: usize,
    /// CRC32C of each unit, in unit order
    pub checksums: Vec<u32>,
}

impl Manifest {
    pub fn new(schema: &ErasureSchema, original_size: usize, units: &[ErasureUnit]) -> Self {
        Self {
            codec: schema.codec_name().to_string(),
            num_data_units: schema.num_data_units(),
            num_parity_units: schema.num_parity_units(),
            original_size,
            unit_size: units.first().map_or(0, ErasureUnit::size),
            checksums: units.iter().map(|u| u.checksum).collect(),
        }
    }

    pub fn schema(&self) -> ErasureSchema {
        ErasureSchema::new(&self.codec, self.num_data_units, self.num_parity_units)
    }

    pub fn total_units(&self) -> usize {
        self.num_data_units + self.num_parity_units
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if manifest.checksums.len() != manifest.total_units() {
            bail!(
                "manifest lists {} checksums for {} units",
                manifest.checksums.len(),
                manifest.total_units()
            );
        }
        Ok(manifest)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path(dir);
        std::fs::write(&path, toml::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Read unit `index` from `dir`
    ///
    /// Missing units and units failing their checksum come back as `None`.
    pub fn read_unit(&self, dir: &Path, index: usize) -> Result<Option<Vec<u8>>> {
        let path = dir.join(unit_file_name(index));
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(index, "Unit missing");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        if data.len() != self.unit_size || crc32c::crc32c(&data) != self.checksums[index] {
            tracing::warn!(index, "Unit failed checksum, treating as missing");
            return Ok(None);
        }
        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecplug_erasure::ErasureCodec;

    fn encode_units(schema: &ErasureSchema, data: &[u8]) -> Vec<ErasureUnit> {
        ErasureCodec::with_builtins(schema)
            .unwrap()
            .encode_units(data)
            .unwrap()
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let schema = ErasureSchema::rs_3_2();
        let encoded = encode_units(&schema, b"manifest test");

        let manifest = Manifest::new(&schema, 13, &encoded);
        manifest.save(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.schema(), schema);
        assert_eq!(loaded.total_units(), 5);
    }

    #[test]
    fn test_read_unit_skips_corrupt_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let schema = ErasureSchema::xor_2_1();
        let encoded = encode_units(&schema, b"abc");
        let manifest = Manifest::new(&schema, 3, &encoded);

        std::fs::write(dir.path().join(unit_file_name(0)), &encoded[0].data).unwrap();
        let mut corrupt = encoded[1].data.to_vec();
        corrupt[0] ^= 1;
        std::fs::write(dir.path().join(unit_file_name(1)), corrupt).unwrap();

        assert!(manifest.read_unit(dir.path(), 0).unwrap().is_some());
        assert!(manifest.read_unit(dir.path(), 1).unwrap().is_none());
        assert!(manifest.read_unit(dir.path(), 2).unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_bad_checksum_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            Manifest::path(dir.path()),
            "codec = \"rs\"\nnum_data_units = 3\nnum_parity_units = 2\n\
             original_size = 1\nunit_size = 64\nchecksums = [1, 2]\n",
        )
        .unwrap();
        assert!(Manifest::load(dir.path()).is_err());
    }
}
