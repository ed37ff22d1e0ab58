/// Tunables for the runtime tick loop (§4.7).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default wall-clock tick length; a deterministic/scenario driver may
    /// advance `timestamp` by a different amount per call instead.
    pub tick_interval_ms: i64,
    /// Max queued outputs per destination before backpressure drops the
    /// oldest with a warning (§4.7 "`pendingOutputs` is bounded per
    /// destination").
    pub pending_outputs_bound: usize,
    /// Consecutive blocks with no `j_event` before a liveness warning (§4.5).
    pub j_block_liveness_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            pending_outputs_bound: 1_000,
            j_block_liveness_interval: 50,
        }
    }
}
