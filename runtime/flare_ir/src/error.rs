//! Decoding errors.
//!
//! Decoding never panics on malformed input. Callers decide whether a
//! [`DecodeError`] ends the run (a truncated action header) or is logged and
//! degraded (a short payload inside an otherwise well-formed action).

/// A failure while reading action bytes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The action header claims more payload than the buffer holds.
    #[error("action at {pc} declares {len} payload bytes but only {available} remain")]
    Truncated {
        pc: usize,
        len: usize,
        available: usize,
    },
    /// A payload reader ran off the end of its payload.
    #[error("unexpected end of payload at offset {offset}")]
    UnexpectedEnd { offset: usize },
    /// A string had no NUL terminator before the end of its payload.
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },
}
