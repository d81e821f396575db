/// Structured error handling for PaperBot
///
/// The trading core returns typed errors so the command layer can map each
/// failure to a user-facing chat message. `anyhow` is reserved for the binary
/// boundary (startup, config loading).

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BotError {
    /// Bad user input: non-numeric price, non-positive shares, etc.
    /// Recovered locally; the user is re-prompted and no state changes.
    Validation(String),

    /// Stock identifier matches no held position (or no catalog entry).
    NotFound(String),

    /// A sell was requested for more shares than the position holds.
    InsufficientShares { requested: i64, held: i64 },

    /// Monthly archival is in progress; mutating operations are rejected
    /// but may be retried once the archival phase ends.
    SystemBusy,

    /// The price collaborator returned no quote for the stock.
    PriceUnavailable(String),

    /// The user already has an interactive trade flow awaiting input.
    AlreadyPending,

    /// Ledger persistence failure (I/O or CSV parse).
    Ledger(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Validation(msg) => write!(f, "Validation Error: {}", msg),
            BotError::NotFound(what) => write!(f, "Not Found: {}", what),
            BotError::InsufficientShares { requested, held } => write!(
                f,
                "Insufficient Shares: requested {} but only {} held",
                requested, held
            ),
            BotError::SystemBusy => write!(f, "System Busy: monthly archival in progress"),
            BotError::PriceUnavailable(code) => {
                write!(f, "Price Unavailable: no quote for {}", code)
            }
            BotError::AlreadyPending => {
                write!(f, "Already Pending: an interactive trade is awaiting input")
            }
            BotError::Ledger(msg) => write!(f, "Ledger Error: {}", msg),
        }
    }
}

impl std::error::Error for BotError {}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Ledger(e.to_string())
    }
}

impl From<csv::Error> for BotError {
    fn from(e: csv::Error) -> Self {
        BotError::Ledger(e.to_string())
    }
}

/// Convenience alias used throughout the trading core
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = BotError::InsufficientShares {
            requested: 100,
            held: 30,
        };
        assert!(e.to_string().contains("requested 100"));
        assert!(e.to_string().contains("30 held"));

        assert!(BotError::SystemBusy.to_string().contains("archival"));
    }
}
