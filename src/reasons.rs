//! Revert-Reason Translation Module
//!
//! Maps known contract revert-reason substrings to user-facing messages.
//! The list is evaluated in order and the first match wins; unrecognized
//! reasons pass through verbatim. Translation is advisory only and never
//! gates whether a transaction is submitted.

/// Known revert-reason substrings and their user-facing messages, in match
/// order.
const KNOWN_REASONS: &[(&str, &str)] = &[
    ("AlreadyClaimed", "You already claimed from this packet"),
    ("PoolNotExpired", "This packet has not expired yet"),
    ("PoolExpired", "This packet has expired"),
    ("PoolFullyClaimed", "This packet has been fully claimed"),
    ("PoolNotFound", "This packet does not exist"),
    ("NotPoolCreator", "Only the packet creator can do this"),
    ("NothingToRefund", "There is nothing left to refund"),
];

/// Translates a node-reported revert reason into a user-facing message.
///
/// Falls back to the raw reason when no known substring matches.
pub fn user_message(reason: &str) -> String {
    for (pattern, message) in KNOWN_REASONS {
        if reason.contains(pattern) {
            return (*message).to_string();
        }
    }
    reason.to_string()
}

/// Whether a pre-flight error is the "insufficient funds for gas" case.
///
/// On the sponsored refund path this error is expected and ignored: the fee
/// payer, not the sender, covers gas.
pub fn is_insufficient_gas(reason: &str) -> bool {
    reason.contains("insufficient funds for gas")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What is tested: each known reason maps to its user-facing message
    /// Why: the mapping is the only place revert text becomes UI copy
    #[test]
    fn test_known_reasons_translate() {
        assert_eq!(
            user_message("execution reverted: AlreadyClaimed()"),
            "You already claimed from this packet"
        );
        assert_eq!(
            user_message("execution reverted: PoolExpired()"),
            "This packet has expired"
        );
        assert_eq!(
            user_message("execution reverted: PoolFullyClaimed()"),
            "This packet has been fully claimed"
        );
        assert_eq!(
            user_message("execution reverted: PoolNotFound()"),
            "This packet does not exist"
        );
        assert_eq!(
            user_message("execution reverted: NotPoolCreator()"),
            "Only the packet creator can do this"
        );
        assert_eq!(
            user_message("execution reverted: NothingToRefund()"),
            "There is nothing left to refund"
        );
    }

    /// What is tested: PoolNotExpired matches before the PoolExpired pattern
    /// Why: the list is ordered and the narrower reason must win
    #[test]
    fn test_not_expired_ordering() {
        assert_eq!(
            user_message("execution reverted: PoolNotExpired()"),
            "This packet has not expired yet"
        );
    }

    /// What is tested: unrecognized reasons pass through verbatim
    /// Why: the node's message is more useful than a generic failure
    #[test]
    fn test_unknown_reason_passes_through() {
        let raw = "execution reverted: SomethingNovel(42)";
        assert_eq!(user_message(raw), raw);
    }

    /// What is tested: the insufficient-gas special case is detected
    /// Why: sponsored refunds deliberately ignore this pre-flight error
    #[test]
    fn test_insufficient_gas_detection() {
        assert!(is_insufficient_gas(
            "err: insufficient funds for gas * price + value"
        ));
        assert!(!is_insufficient_gas("execution reverted: PoolExpired()"));
    }
}
