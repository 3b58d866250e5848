use thiserror::Error;

/// EVM request validation errors.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid typed data: {0}")]
    InvalidTypedData(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_address() {
        let err = EthError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_invalid_hash() {
        let err = EthError::InvalidHash("expected 32 bytes".into());
        assert_eq!(err.to_string(), "invalid hash: expected 32 bytes");
    }

    #[test]
    fn display_invalid_typed_data() {
        let err = EthError::InvalidTypedData("unknown primary type Mail".into());
        assert_eq!(err.to_string(), "invalid typed data: unknown primary type Mail");
    }

    #[test]
    fn display_unsupported_chain() {
        let err = EthError::UnsupportedChain(999);
        assert_eq!(err.to_string(), "unsupported chain: 999");
    }

    #[test]
    fn debug_format_works() {
        let err = EthError::UnsupportedChain(42);
        assert!(format!("{err:?}").contains("UnsupportedChain"));
    }
}
