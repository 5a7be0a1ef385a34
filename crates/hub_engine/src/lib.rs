//! Hub engine: HTTP clients, the recovery cache and the effect runtime.
mod cache;
mod client;
mod engine;
mod filename;
mod identity;
mod persist;
mod types;

pub use cache::RecoveryCache;
pub use client::{ApiSettings, DraftApi, JobApi, ReqwestHubClient};
pub use engine::{Backends, EngineHandle};
pub use filename::cache_filename;
pub use identity::{IdentityProvider, StaticTokenProvider, ACCESS_TOKEN_ENV};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use types::{ApiError, EngineError, EngineEvent};
