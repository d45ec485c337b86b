//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (FHE library, storage,
//! compression).

mod codec;
mod he_scheme;
mod storage;

pub use codec::{BlobCodec, CodecError};
pub use he_scheme::HomomorphicScheme;
pub use storage::KeyValueStore;
