//! Error surfaced by the retry loop once it gives up.

/// Why `execute_with_retry` stopped without a result.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error seen.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: E,
    },
    /// A cancel token was set between attempts.
    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn operation(&self) -> &str {
        match self {
            RetryError::Exhausted { operation, .. } | RetryError::Cancelled { operation, .. } => {
                operation
            }
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The last error raised by the operation, if the loop was exhausted.
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}
