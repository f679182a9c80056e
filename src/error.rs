use thiserror::Error;

/// Domain failures that callers are expected to handle explicitly.
/// Infrastructure failures travel as `anyhow::Error` and wrap these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unknown listing: {0}")]
    UnknownListing(String),

    #[error("Vote transaction for {0} was rejected by a conflicting write")]
    VoteConflict(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Sync protocol error: {0}")]
    SyncProtocol(String),
}
