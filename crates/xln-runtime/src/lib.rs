//! xln-runtime — the deterministic tick loop (§4.7, §5) that owns every
//! `EntityReplica`/`JReplica` and advances them one `RuntimeInput` at a time.

pub mod config;
pub mod env;
pub mod error;
pub mod input;
pub mod log;
pub mod snapshot;

pub use config::RuntimeConfig;
pub use env::Env;
pub use error::{RuntimeError, RuntimeResult};
pub use input::{EntityInputItem, JInputItem, RuntimeInput};
pub use log::{LogCategory, LogEntry, LogLevel};
pub use snapshot::{EnvSnapshot, ReplicaHeightRecord};
