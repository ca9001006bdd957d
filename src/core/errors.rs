use thiserror::Error;

/// Failures surfaced by the simulation gate checks.
///
/// Everything else in the engine is input-tolerant by contract: unknown
/// department ids, unknown listener ids, and post-dispose calls are silent
/// no-ops, and listener failures are logged and isolated per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("simulation start rejected: caller is not authenticated")]
    Unauthorized,
    #[error("simulation start rejected: request rate limit exceeded")]
    RateLimitExceeded,
}
