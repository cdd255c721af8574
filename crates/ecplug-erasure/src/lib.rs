//! ecplug erasure coding - pluggable raw coders behind codec-level coders
//!
//! Three layers:
//! - **Raw coders** ([`rawcoder`]): the arithmetic. Built-in `rs` (Reed-Solomon
//!   via `reed-solomon-simd`) and `xor`; more can be registered by name.
//! - **Erasure coders** ([`coder`]): one encoder/decoder per codec. Each asks
//!   the configuration which raw coder factory to use and falls back to the
//!   built-in one when nothing is bound.
//! - **Codec** ([`ErasureCodec`]): splits blocks into units and rebuilds them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ecplug_common::{CoderConf, ErasureSchema, keys};
//! use ecplug_erasure::{ErasureCodec, RawCoderRegistry};
//!
//! let conf = CoderConf::new().with(keys::RS_RAWCODER_KEY, "rs");
//! let codec = ErasureCodec::new(
//!     &ErasureSchema::rs_6_3(),
//!     Some(Arc::new(conf)),
//!     Arc::new(RawCoderRegistry::with_builtins()),
//! )
//! .unwrap();
//! let units = codec.encode(b"Hello, World!").unwrap();
//! assert_eq!(units.len(), 9);
//! ```

pub mod codec;
pub mod coder;
pub mod rawcoder;
pub mod unit;

pub use codec::{ErasureCodec, ErasureError, MIN_UNIT_SIZE};
pub use unit::ErasureUnit;

pub use coder::{
    CoderBase, CoderOptions, ErasureCoder, ErasureCoders, ErasureDecoder, ErasureEncoder,
    RsErasureDecoder, RsErasureEncoder, XorErasureDecoder, XorErasureEncoder,
};
pub use rawcoder::{
    BoxError, CoderRole, FactoryConstructor, RawCoder, RawCoderRegistry, RawCoderResult,
    RawErasureCoder, RawErasureCoderFactory, RawErasureDecoder, RawErasureEncoder, RsRawDecoder,
    RsRawEncoder, RsRawErasureCoderFactory, XorRawDecoder, XorRawEncoder,
    XorRawErasureCoderFactory,
};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        CoderOptions, ErasureCoder, ErasureCoders, ErasureCodec, ErasureDecoder, ErasureEncoder,
        ErasureError, RawCoderRegistry, RawErasureCoderFactory,
    };
}
