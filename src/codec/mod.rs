//! Encoding native stores to documents and decoding documents back

pub mod config;
pub mod decoder;
pub mod encoder;

pub use config::{DecoderConfig, EncoderConfig, IdentifierPolicy, ValueMode};
pub use decoder::Decoder;
pub use encoder::Encoder;
