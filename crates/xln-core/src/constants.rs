//! ─── XLN protocol constants ─────────────────────────────────────────────

/// How long a proposer may stay silent before any validator may re-propose.
pub const TIMEOUT_PROPOSAL_MS: u64 = 5_000;

/// Minimum gap an upstream HTLC timelock must keep over its downstream
/// counterpart, in blocks, to guarantee downstream timeouts fire first.
pub const HTLC_SAFETY_DELTA_BLOCKS: u64 = 10;

/// Default number of routes returned by the pathfinder.
pub const DEFAULT_K_ROUTES: usize = 100;

/// Default runtime tick cadence.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Snapshot cadence, in committed frames, absent an explicit request.
pub const SNAPSHOT_INTERVAL_FRAMES: u64 = 1_000;

/// Bounded retry count for `DependencyGap` inputs before they are dropped.
pub const DEPENDENCY_GAP_MAX_RETRIES: u32 = 5;
