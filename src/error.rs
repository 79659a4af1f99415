//! Error types for the minter and deployer.

use std::fmt;

/// Crate-wide error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error.
    Config(String),
    /// RPC communication error.
    Rpc(String),
    /// Wallet / key material error.
    Wallet(String),
    /// The contract executed the call and reported a failure.
    Contract(String),
    /// The RPC endpoint serves a different network than the configured target.
    WrongNetwork { expected: String, actual: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Wallet(msg) => write!(f, "wallet error: {msg}"),
            Error::Contract(msg) => write!(f, "contract error: {msg}"),
            Error::WrongNetwork { expected, actual } => {
                write!(f, "wrong network: connected to {actual}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_network_display_names_both_networks() {
        let err = Error::WrongNetwork {
            expected: "testnet".into(),
            actual: "mainnet".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("testnet"));
        assert!(msg.contains("mainnet"));
    }
}
