//! xln-core — shared identifiers, the delta algebra, and the sealed
//! transaction/event vocabulary used by every other XLN layer.
//!
//! This crate has no notion of consensus, networking, or persistence; it is
//! the pure-data and pure-math foundation the rest of the workspace builds
//! on, mirroring how the teacher's `chronx-core` underlies every other
//! `chronx-*` crate.

pub mod canonical;
pub mod constants;
pub mod delta;
pub mod error;
pub mod tx;
pub mod types;

pub use delta::{can_apply_payment, apply_payment, derive_delta, Delta, DerivedDelta};
pub use error::{CoreError, CoreResult};
pub use tx::*;
pub use types::*;
