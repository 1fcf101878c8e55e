use thiserror::Error;

/// The shared error taxonomy. Every handler in `xln-entity` and
/// `xln-account` returns one of these instead of panicking or returning a
/// placeholder — no exception ever escapes the pure `(env, inputs) ->
/// env'` boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XlnError {
    /// Signature invalid, nonce/counter mismatch, post-state-root
    /// mismatch, quorum failure. Reported to the submitter; state is
    /// left unmutated.
    #[error("consensus reject: {0}")]
    ConsensusReject(String),

    /// RCPAN breach, negative hold, overflow. Fails the tx; state
    /// unchanged.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A proposal or HTLC timer fired.
    #[error("timeout exceeded: {0}")]
    TimeoutExceeded(String),

    /// Signer not on board, not in quorum, or wrong proposer. Callers
    /// must drop this silently rather than amplify it.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Merkle integrity failure on recovery. Fatal — halts the runtime.
    #[error("state corruption: {0}")]
    StateCorruption(String),

    /// Missing precondition: unknown account, stale J-event. Caller
    /// should enqueue for bounded retry, then drop.
    #[error("dependency gap: {0}")]
    DependencyGap(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}
