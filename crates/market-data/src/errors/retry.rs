/// Classification for retry policy.
///
/// Used by the gateway to decide whether a failed provider call is worth
/// another attempt.
///
/// | Class | Retried? |
/// |-------|----------|
/// | `Never` | No, surfaced immediately |
/// | `WithBackoff` | Yes, after an exponentially growing delay |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Bad symbol, malformed payload, rejected request. Retrying won't help.
    Never,

    /// Timeouts, 5xx responses, upstream 429s and dropped connections.
    WithBackoff,
}

impl RetryClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, RetryClass::WithBackoff)
    }
}
