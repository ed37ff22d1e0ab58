//! ─── XLN Protocol Constants ─────────────────────────────────────────────────
//!
//! Named tunables referenced throughout §4 of the specification. Grouped by
//! the layer that owns the behaviour they govern.

// ── Runtime tick loop (R, §4.7) ───────────────────────────────────────────────

/// Default wall-clock tick length. Deterministic scenarios may drive the
/// runtime at any cadence; this is the real-time default.
pub const DEFAULT_TICK_MS: u64 = 100;

/// Maximum `pendingOutputs` queued per destination before backpressure drops
/// the oldest entry (§4.7 backpressure / DoS protection).
pub const DEFAULT_MAX_PENDING_OUTPUTS_PER_DEST: usize = 1_000;

/// Default retained snapshot history length (time-travel bound, §6).
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 10_000;

// ── Entity Machine (E, §4.4) ──────────────────────────────────────────────────

/// Number of J-heights without a matching observation before a liveness
/// warning is raised for an entity's J-view (§4.4 j_event).
pub const JBLOCK_LIVENESS_INTERVAL: u64 = 50;

/// How many times a rejected account tx may be retried before the entity
/// evicts it from mempool (§7: "bounded number of retries before eviction").
pub const ACCOUNT_TX_MAX_RETRIES: u32 = 3;

// ── HTLC + swap subsystem (§4.3) ──────────────────────────────────────────────

/// Default number of J-heights an HTLC lock stays revealable
/// (`revealBeforeHeight = current jHeight + N`) when a route does not
/// specify its own window.
pub const DEFAULT_HTLC_TIMEOUT_HEIGHTS: u64 = 20;

/// Fixed-point denominator for swap fill ratios (`fillRatio ∈ [0, 65535]`).
pub const SWAP_FILL_RATIO_DENOMINATOR: u32 = 65_535;

// ── Jurisdiction Machine (J, §4.6) ────────────────────────────────────────────

/// Default delay between jurisdiction blocks.
pub const DEFAULT_J_BLOCK_DELAY_MS: u64 = 1_000;

// ── Defaults applied to a freshly added delta (§4.1 `addTokenIfMissing`) ─────

/// A newly added token delta carries zero credit limits on both sides unless
/// the entity's board configuration specifies otherwise — no implicit credit.
pub const DEFAULT_CREDIT_LIMIT: i64 = 0;
