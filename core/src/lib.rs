//! Wire-level primitives shared by bridge relayers and the settlement core.
//!
//! A relayer observing a lock on the source ledger and the receiver settling it on the target
//! ledger must agree byte-for-byte on what was signed. Everything that agreement depends on lives
//! in this crate:
//!
//! - Opaque identity types for contracts, accounts, assets and chains.
//! - The `LockEvent` tuple and its canonical, versioned encoding.
//! - The event `Digest` and the secp256k1 signing and verification helpers.

mod address;
pub mod event;
pub mod signature;

pub use {
    address::{Address, AssetId, ChainId},
    event::{Digest, EncodingVersion, LockEvent},
    signature::{
        sign_event, sign_event_with, verify_event, verify_event_with, RelayerKey, SignatureError,
    },
};
