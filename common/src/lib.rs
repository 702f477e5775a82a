//! Build EIP-712 typed-data payloads, have a wallet session sign them, and
//! recover the signer's public key from the resulting signature.

pub mod documents;
pub mod error;
pub mod helper;
pub mod payloads;
pub mod signing;
pub mod typed_data;
pub mod wallet;

pub use error::{Result, SignError};
pub use helper::{SignedTypedData, TypedDataSigner, DEFAULT_TIMEOUT};
pub use signing::{recover_signer_key, RecoveredKey};
pub use typed_data::{
    compute_message_hash, eip712_parts, Eip712Parts, FieldSpec, TypedDataDescriptor,
};
pub use wallet::{Approval, LocalWalletSession, Prompter, WalletSession};
