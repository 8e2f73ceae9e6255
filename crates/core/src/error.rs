use thiserror::Error;

/// Failure modes of the temporal resampler and its kernel backends.
///
/// `InvalidParameter` is raised eagerly, before any chunk is dispatched.
/// `Cancelled` is cooperative and only observed at chunk boundaries.
/// `ResourceExhausted` originates in a backend and is propagated verbatim,
/// never retried.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl ResampleError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResampleError::invalid("multiplier must be positive, got 0");
        assert_eq!(
            err.to_string(),
            "invalid parameter: multiplier must be positive, got 0"
        );
        assert_eq!(ResampleError::Cancelled.to_string(), "operation cancelled");
        assert_eq!(
            ResampleError::ResourceExhausted("chunk of 4096 columns".to_string()).to_string(),
            "resource exhausted: chunk of 4096 columns"
        );
    }

    #[test]
    fn test_error_downcasts_through_anyhow() {
        let err: anyhow::Error = ResampleError::Cancelled.into();
        assert!(matches!(
            err.downcast_ref::<ResampleError>(),
            Some(ResampleError::Cancelled)
        ));
    }
}
