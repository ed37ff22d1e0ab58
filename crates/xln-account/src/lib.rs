//! xln-account — the bilateral 2-of-2 account consensus machine (§4.2).
//!
//! Two entities' replicas each hold their own `AccountMachine` for a given
//! `AccountKey`; there is no shared mutable instance (§3 Ownership). This
//! crate depends on `xln-core` for the delta algebra and on `xln-htlc` for
//! locks/swap offers, and exposes the frame lifecycle that `xln-entity`
//! drives via `accountInput`/`directPayment`/`htlcPayment` entity txs.

pub mod error;
pub mod frame;
pub mod machine;
pub mod transitions;

pub use error::{AccountError, AccountResult};
pub use frame::{AccountFrame, ProofBody, ProofHeader, SignedProof};
pub use machine::{AccountMachine, PendingWithdrawal};
pub use transitions::{apply_account_tx, TxContext};
pub use xln_core::AccountEvent;
