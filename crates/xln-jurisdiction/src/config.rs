/// Tunables for a jurisdiction's deterministic block producer (§4.6).
#[derive(Debug, Clone)]
pub struct JurisdictionConfig {
    /// Minimum wall time between blocks: a block is only produced once
    /// `currentTimestamp - lastBlockTimestamp >= block_delay_ms` and the
    /// mempool is nonempty.
    pub block_delay_ms: u64,
    /// Consecutive blocks with no `j_event` observation from any entity
    /// before a liveness warning is raised (§4.5).
    pub liveness_interval_blocks: u64,
}

impl Default for JurisdictionConfig {
    fn default() -> Self {
        Self {
            block_delay_ms: 1_000,
            liveness_interval_blocks: 50,
        }
    }
}
