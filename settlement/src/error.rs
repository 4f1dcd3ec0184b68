use relay_bridge_core::{Address, ChainId};
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("caller is not authorized")]
    Unauthorized,
    #[error("relayer {0} is not whitelisted")]
    NotWhitelisted(Address),
    #[error("{0} is not configured")]
    NotConfigured(Missing),
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },
    #[error("source contract {0} does not match the configured peer")]
    InvalidSourceContract(Address),
    #[error("event is addressed to {0}, not this instance")]
    InvalidTargetContract(Address),
    #[error("chain id {actual} does not match the configured peer chain {expected}")]
    InvalidChainId { expected: ChainId, actual: ChainId },
    #[error("invalid relayer signature")]
    InvalidSignature,
    #[error("event does not match the pending record for nonce {0}")]
    PayloadMismatch(u64),
    #[error("nonce {0} has already been settled")]
    NonceAlreadyUsed(u64),
    #[error("lock nonce would overflow")]
    NonceOverflow,
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("receiver address must not be empty")]
    InvalidReceiverAddress,
    #[error("relayer {0} is already registered")]
    RelayerAlreadyExists(Address),
    #[error("relayer key is already registered to {0}")]
    DuplicateRelayerKey(Address),
    #[error("relayer {0} is not registered")]
    RelayerNotFound(Address),
    #[error("relayer set is full ({0} relayers)")]
    TooManyRelayers(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Configuration a bridge operation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Asset,
    Peer,
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Asset => f.write_str("bridged asset"),
            Missing::Peer => f.write_str("peer binding"),
        }
    }
}

/// Coarse classification of [`BridgeError`]s for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Configuration,
    Economic,
    ProtocolIntegrity,
    Replay,
    Capacity,
    Ledger,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        use BridgeError::*;

        match self {
            Unauthorized | NotWhitelisted(_) => ErrorKind::Authorization,
            NotConfigured(_) | InvalidConfig(_) => ErrorKind::Configuration,
            InsufficientBalance { .. } | InvalidAmount | InvalidReceiverAddress => {
                ErrorKind::Economic
            }
            InvalidSourceContract(_)
            | InvalidTargetContract(_)
            | InvalidChainId { .. }
            | InvalidSignature
            | PayloadMismatch(_) => ErrorKind::ProtocolIntegrity,
            NonceAlreadyUsed(_) | NonceOverflow => ErrorKind::Replay,
            RelayerAlreadyExists(_)
            | DuplicateRelayerKey(_)
            | RelayerNotFound(_)
            | TooManyRelayers(_) => ErrorKind::Capacity,
            Ledger(_) => ErrorKind::Ledger,
        }
    }
}
