//! Raw coder configuration
//!
//! `CoderConf` is a flat string key/value store. The only thing the coding
//! layer asks of it is "which raw coder factory is bound to key K".
//!
//! # File format
//!
//! ```toml
//! [rawcoder]
//! # full key
//! "io.erasurecode.codec.rs.rawcoder" = "rs"
//! # short form, expanded to io.erasurecode.codec.xor.rawcoder
//! xor = "xor"
//!
//! [settings]
//! "io.erasurecode.cell.size" = "65536"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Well-known configuration keys
pub mod keys {
    /// Raw coder factory used by Reed-Solomon coders
    pub const RS_RAWCODER_KEY: &str = "io.erasurecode.codec.rs.rawcoder";
    /// Raw coder factory used by XOR coders
    pub const XOR_RAWCODER_KEY: &str = "io.erasurecode.codec.xor.rawcoder";

    /// Raw coder key for an arbitrary codec name
    #[must_use]
    pub fn rawcoder_key(codec_name: &str) -> String {
        format!("io.erasurecode.codec.{codec_name}.rawcoder")
    }
}

/// On-disk layout of a configuration file
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfFile {
    #[serde(default)]
    rawcoder: BTreeMap<String, String>,
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

/// String key/value configuration store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoderConf {
    values: BTreeMap<String, String>,
}

impl CoderConf {
    /// Create an empty configuration (no bindings)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfFile = toml::from_str(text)?;
        let mut conf = Self::new();

        for (key, value) in file.settings {
            conf.set(key, value);
        }
        for (key, factory) in file.rawcoder {
            let key = if key.contains('.') {
                key
            } else {
                keys::rawcoder_key(&key)
            };
            conf.set(key, factory);
        }

        Ok(conf)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let conf = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), entries = conf.len(), "Loaded coder configuration");
        Ok(conf)
    }

    /// Serialize back to TOML; raw coder bindings go to the `[rawcoder]` table
    pub fn to_toml_string(&self) -> Result<String> {
        let mut file = ConfFile::default();
        for (key, value) in &self.values {
            if key.ends_with(".rawcoder") {
                file.rawcoder.insert(key.clone(), value.clone());
            } else {
                file.settings.insert(key.clone(), value.clone());
            }
        }
        Ok(toml::to_string(&file)?)
    }

    /// Set a value, replacing any previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`CoderConf::set`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove a value
    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Get a raw value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a value, or `default` if absent
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Name of the raw coder factory bound to `key`
    ///
    /// Blank values count as unbound.
    #[must_use]
    pub fn get_factory(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_get_factory() {
        let conf = CoderConf::new()
            .with(keys::RS_RAWCODER_KEY, "rs")
            .with(keys::XOR_RAWCODER_KEY, "   ");

        assert_eq!(conf.get_factory(keys::RS_RAWCODER_KEY), Some("rs"));
        assert_eq!(conf.get_factory(keys::XOR_RAWCODER_KEY), None);
        assert_eq!(conf.get_factory("io.erasurecode.codec.lrc.rawcoder"), None);
    }

    #[test]
    fn test_from_toml_str() {
        let conf = CoderConf::from_toml_str(
            r#"
            [rawcoder]
            "io.erasurecode.codec.rs.rawcoder" = "rs"
            xor = "my-xor"

            [settings]
            "io.erasurecode.cell.size" = "65536"
            "#,
        )
        .unwrap();

        assert_eq!(conf.get_factory(keys::RS_RAWCODER_KEY), Some("rs"));
        assert_eq!(conf.get_factory(keys::XOR_RAWCODER_KEY), Some("my-xor"));
        assert_eq!(conf.get("io.erasurecode.cell.size"), Some("65536"));
        assert_eq!(conf.len(), 3);
    }

    #[test]
    fn test_empty_toml() {
        let conf = CoderConf::from_toml_str("").unwrap();
        assert!(conf.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        let err = CoderConf::from_toml_str("[rawcoder\nrs = ").unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn test_to_toml_keeps_bindings() {
        let conf = CoderConf::new()
            .with(keys::RS_RAWCODER_KEY, "rs")
            .with("io.erasurecode.cell.size", "4096");
        let text = conf.to_toml_string().unwrap();
        assert!(text.contains("[rawcoder]"));
        assert_eq!(CoderConf::from_toml_str(&text).unwrap(), conf);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rawcoder]\nrs = \"rs\"").unwrap();

        let conf = CoderConf::load(file.path()).unwrap();
        assert_eq!(conf.get_factory(keys::RS_RAWCODER_KEY), Some("rs"));

        let missing = CoderConf::load("/nonexistent/ecplug.toml").unwrap_err();
        assert!(missing.is_configuration());
    }

    #[test]
    fn test_unset_and_default() {
        let mut conf = CoderConf::new().with("a", "1");
        assert_eq!(conf.get_or("b", "2"), "2");
        assert_eq!(conf.unset("a").as_deref(), Some("1"));
        assert!(conf.is_empty());
    }
}
