//! Raw coder plugin registry
//!
//! Maps factory names to constructors. A configuration key selects a factory
//! name (see [`CoderConf::get_factory`]); the registry instantiates that
//! factory and asks it for an encoder or decoder.
//!
//! Resolution has three outcomes:
//! - no configuration, or no binding for the key: `Ok(None)`, the caller
//!   falls back to its built-in coder
//! - the bound factory cannot be constructed: `Err(PluginInstantiationFailed)`
//! - otherwise: `Ok(Some(raw_coder))`
//!
//! Nothing is cached; every resolve constructs a fresh factory and coder.

use super::{
    BoxError, CoderRole, RawCoder, RawCoderResult, RawErasureCoderFactory, RawErasureDecoder,
    RawErasureEncoder, RsRawErasureCoderFactory, XorRawErasureCoderFactory,
};
use crate::ErasureError;
use ecplug_common::CoderConf;
use std::collections::BTreeMap;

/// Constructor for a registered factory, the equivalent of a no-argument
/// constructor that may fail
pub type FactoryConstructor = fn() -> Result<Box<dyn RawErasureCoderFactory>, BoxError>;

fn construct_default<F>() -> Result<Box<dyn RawErasureCoderFactory>, BoxError>
where
    F: RawErasureCoderFactory + Default + 'static,
{
    Ok(Box::new(F::default()))
}

/// Registry of raw coder factories, keyed by name
#[derive(Clone, Default)]
pub struct RawCoderRegistry {
    constructors: BTreeMap<String, FactoryConstructor>,
}

impl RawCoderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in `rs` and `xor` factories
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_default::<RsRawErasureCoderFactory>(RsRawErasureCoderFactory::NAME)
            .register_default::<XorRawErasureCoderFactory>(XorRawErasureCoderFactory::NAME);
        registry
    }

    /// Register a factory constructor under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, constructor: FactoryConstructor) -> &mut Self {
        let name = name.into();
        if self.constructors.insert(name.clone(), constructor).is_some() {
            tracing::debug!(factory = %name, "Replaced raw coder factory registration");
        }
        self
    }

    /// Register a factory type constructed through `Default`
    pub fn register_default<F>(&mut self, name: impl Into<String>) -> &mut Self
    where
        F: RawErasureCoderFactory + Default + 'static,
    {
        self.register(name, construct_default::<F>)
    }

    /// Check whether a factory is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered factory names, sorted
    pub fn factory_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Construct the factory registered under `factory`
    ///
    /// `key` is only used to attribute the error.
    pub fn instantiate(
        &self,
        key: &str,
        factory: &str,
    ) -> RawCoderResult<Box<dyn RawErasureCoderFactory>> {
        let fail = |source: BoxError| {
            tracing::warn!(key, factory, error = %source, "Failed to create raw coder factory");
            ErasureError::PluginInstantiationFailed {
                key: key.to_string(),
                factory: factory.to_string(),
                source,
            }
        };

        let constructor = self
            .constructors
            .get(factory)
            .ok_or_else(|| fail(format!("no raw coder factory registered as '{factory}'").into()))?;

        constructor().map_err(fail)
    }

    /// Resolve the raw coder bound to `key`
    ///
    /// # Arguments
    /// * `conf` - configuration, `None` when the deployment has none
    /// * `key` - configuration key naming the factory
    /// * `role` - encoder or decoder
    /// * `num_data_units` / `num_parity_units` - unit counts for the coder
    ///
    /// # Returns
    /// `Ok(None)` when there is no configuration or nothing is bound to `key`
    pub fn resolve(
        &self,
        conf: Option<&CoderConf>,
        key: &str,
        role: CoderRole,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Option<RawCoder>> {
        let Some(conf) = conf else {
            tracing::debug!(key, "No configuration, no raw coder resolved");
            return Ok(None);
        };

        let Some(factory_name) = conf.get_factory(key) else {
            tracing::debug!(key, "No raw coder factory bound to key");
            return Ok(None);
        };

        let factory = self.instantiate(key, factory_name)?;

        let coder = match role {
            CoderRole::Encode => {
                RawCoder::Encoder(factory.create_encoder(num_data_units, num_parity_units)?)
            }
            CoderRole::Decode => {
                RawCoder::Decoder(factory.create_decoder(num_data_units, num_parity_units)?)
            }
        };

        tracing::debug!(
            key,
            factory = factory.name(),
            %role,
            num_data_units,
            num_parity_units,
            "Resolved raw coder"
        );
        Ok(Some(coder))
    }

    /// [`RawCoderRegistry::resolve`] for the encoder role
    pub fn resolve_encoder(
        &self,
        conf: Option<&CoderConf>,
        key: &str,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Option<Box<dyn RawErasureEncoder>>> {
        Ok(self
            .resolve(conf, key, CoderRole::Encode, num_data_units, num_parity_units)?
            .and_then(RawCoder::into_encoder))
    }

    /// [`RawCoderRegistry::resolve`] for the decoder role
    pub fn resolve_decoder(
        &self,
        conf: Option<&CoderConf>,
        key: &str,
        num_data_units: usize,
        num_parity_units: usize,
    ) -> RawCoderResult<Option<Box<dyn RawErasureDecoder>>> {
        Ok(self
            .resolve(conf, key, CoderRole::Decode, num_data_units, num_parity_units)?
            .and_then(RawCoder::into_decoder))
    }
}

impl std::fmt::Debug for RawCoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factory_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rawcoder::RawErasureCoder;
    use ecplug_common::keys;
    use rand::Rng;

    const TEST_KEY: &str = "io.erasurecode.codec.test.rawcoder";

    fn broken_factory() -> Result<Box<dyn RawErasureCoderFactory>, BoxError> {
        Err("no usable default constructor".into())
    }

    fn registry() -> RawCoderRegistry {
        let mut registry = RawCoderRegistry::with_builtins();
        registry.register("broken", broken_factory);
        registry
    }

    #[test]
    fn test_builtins() {
        let registry = RawCoderRegistry::with_builtins();
        assert_eq!(registry.factory_names().collect::<Vec<_>>(), vec!["rs", "xor"]);
        assert!(registry.contains("rs"));
        assert!(!registry.contains("isal"));
        assert!(RawCoderRegistry::new().is_empty());
    }

    #[test]
    fn test_resolve_without_conf() {
        let registry = registry();
        let mut rng = rand::thread_rng();

        for _ in 0..32 {
            let d = rng.gen_range(0..64);
            let p = rng.gen_range(0..64);
            for role in [CoderRole::Encode, CoderRole::Decode] {
                for key in [keys::RS_RAWCODER_KEY, TEST_KEY, ""] {
                    let resolved = registry.resolve(None, key, role, d, p).unwrap();
                    assert!(resolved.is_none());
                }
            }
        }
    }

    #[test]
    fn test_resolve_unbound_key() {
        let registry = registry();
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");

        let resolved = registry
            .resolve(Some(&conf), TEST_KEY, CoderRole::Encode, 6, 3)
            .unwrap();
        assert!(resolved.is_none());

        // Even a broken factory is never touched when nothing points at it
        let resolved = registry
            .resolve(Some(&CoderConf::new()), TEST_KEY, CoderRole::Decode, 6, 3)
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_resolve_bound_factory() {
        let registry = registry();
        let conf = CoderConf::new()
            .with(keys::RS_RAWCODER_KEY, "rs")
            .with(keys::XOR_RAWCODER_KEY, "xor");

        let coder = registry
            .resolve(Some(&conf), keys::RS_RAWCODER_KEY, CoderRole::Encode, 6, 3)
            .unwrap()
            .unwrap();
        assert_eq!(coder.role(), CoderRole::Encode);
        assert_eq!(coder.name(), "rs");
        assert_eq!(coder.num_data_units(), 6);
        assert_eq!(coder.num_parity_units(), 3);

        let coder = registry
            .resolve(Some(&conf), keys::XOR_RAWCODER_KEY, CoderRole::Decode, 5, 1)
            .unwrap()
            .unwrap();
        assert_eq!(coder.role(), CoderRole::Decode);
        assert_eq!(coder.num_data_units(), 5);
        assert_eq!(coder.num_parity_units(), 1);
    }

    #[test]
    fn test_resolve_broken_factory() {
        let registry = registry();
        let conf = CoderConf::new().with(TEST_KEY, "broken");

        let err = registry
            .resolve(Some(&conf), TEST_KEY, CoderRole::Encode, 6, 3)
            .unwrap_err();
        match err {
            ErasureError::PluginInstantiationFailed { key, factory, source } => {
                assert_eq!(key, TEST_KEY);
                assert_eq!(factory, "broken");
                assert_eq!(source.to_string(), "no usable default constructor");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_unregistered_factory() {
        let registry = registry();
        let conf = CoderConf::new().with(TEST_KEY, "isal");

        let err = registry
            .resolve(Some(&conf), TEST_KEY, CoderRole::Decode, 6, 3)
            .unwrap_err();
        assert!(matches!(err, ErasureError::PluginInstantiationFailed { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_resolve_propagates_factory_limits() {
        let registry = registry();
        let conf = CoderConf::new().with(keys::XOR_RAWCODER_KEY, "xor");

        let err = registry
            .resolve(Some(&conf), keys::XOR_RAWCODER_KEY, CoderRole::Encode, 6, 3)
            .unwrap_err();
        assert!(matches!(err, ErasureError::InvalidConfig(_)));
    }

    #[test]
    fn test_resolve_is_not_cached() {
        let registry = registry();
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");

        let mut first = registry
            .resolve_encoder(Some(&conf), keys::RS_RAWCODER_KEY, 2, 1)
            .unwrap()
            .unwrap();
        let second = registry
            .resolve_encoder(Some(&conf), keys::RS_RAWCODER_KEY, 2, 1)
            .unwrap()
            .unwrap();

        first.release();

        let a = [1u8; 64];
        let b = [2u8; 64];
        assert!(matches!(first.encode(&[&a, &b]), Err(ErasureError::CoderReleased)));
        assert_eq!(second.encode(&[&a, &b]).unwrap().len(), 1);
    }

    #[test]
    fn test_typed_resolve() {
        let registry = registry();
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");

        let decoder = registry
            .resolve_decoder(Some(&conf), keys::RS_RAWCODER_KEY, 4, 2)
            .unwrap()
            .unwrap();
        assert_eq!(decoder.num_all_units(), 6);
        assert!(decoder.prefer_direct_buffer());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = RawCoderRegistry::with_builtins();
        registry.register_default::<XorRawErasureCoderFactory>("rs");
        let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");

        let coder = registry
            .resolve(Some(&conf), keys::RS_RAWCODER_KEY, CoderRole::Encode, 3, 1)
            .unwrap()
            .unwrap();
        assert_eq!(coder.name(), "xor");
        assert_eq!(registry.len(), 2);
    }
}
