//! Common error types shared by the flvpush crates.

/// Common error type for flvpush.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A payload does not fit into the packet body buffer.
    #[error("Payload of {declared} bytes exceeds packet capacity of {capacity} bytes")]
    CapacityExceeded { declared: usize, capacity: usize },

    /// AMF0 data could not be encoded or decoded.
    #[error("AMF error: {0}")]
    Amf(String),
}

impl Error {
    /// Create a new Amf error.
    pub fn amf<S: Into<String>>(msg: S) -> Self {
        Self::Amf(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CapacityExceeded {
            declared: 70000,
            capacity: 65536,
        };
        assert_eq!(
            err.to_string(),
            "Payload of 70000 bytes exceeds packet capacity of 65536 bytes"
        );

        let err = Error::amf("unexpected marker 0x0d");
        assert_eq!(err.to_string(), "AMF error: unexpected marker 0x0d");
    }

    #[test]
    fn test_error_string_into() {
        let err = Error::amf(String::from("truncated"));
        assert!(matches!(err, Error::Amf(ref m) if m == "truncated"));
    }
}
