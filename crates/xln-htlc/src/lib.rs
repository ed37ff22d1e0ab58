//! xln-htlc — hash-time-locked transfers and the swap/orderbook subsystem
//! (§4.3), shared by `xln-account` (per-account locks/offers) and
//! `xln-entity` (routing context across accounts).

pub mod lock;
pub mod routing;
pub mod swap;

pub use lock::{HtlcLock, LockStatus, DEFAULT_HTLC_TIMEOUT_HEIGHTS};
pub use routing::{HtlcRoute, RoutingTable};
pub use swap::{fill_ratio, ExecutionStyle, OrderBook, SwapOffer, SwapStatus};
pub use xln_core::constants::SWAP_FILL_RATIO_DENOMINATOR;
