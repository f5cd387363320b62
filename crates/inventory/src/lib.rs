//! Per-user box and item inventory over a schemaless key-value store.
//!
//! Ownership is carried entirely by key names (see [`keys`]); the
//! [`service::BoxKeeper`] facade resolves the owner from a session token
//! before any key is derived.

pub mod artifacts;
pub mod credentials;
pub mod error;
pub mod keys;
pub mod kv;
pub mod repository;
pub mod service;
pub mod session;

pub use artifacts::{ArtifactPipeline, LocalArtifacts};
pub use credentials::{CredentialStore, Registration};
pub use error::{ArtifactError, Error, Result, StoreError};
pub use kv::{KvStore, MemoryStore, RedisStore};
pub use repository::{BoxFields, BoxRecord, BoxWithItems, Inventory, ItemFields, ItemRecord};
pub use service::BoxKeeper;
pub use session::SessionAuthority;
