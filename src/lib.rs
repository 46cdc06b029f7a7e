//! # satoshi-core
//!
//! A from-scratch implementation of the Bitcoin primitives: modular
//! arithmetic over prime fields, the secp256k1 group law, FIPS 180-4
//! SHA-256, ECDSA with deterministic nonces, Base58Check addresses, the
//! transaction and block header wire formats, P2PKH script validation, and
//! a minimal blocking peer-to-peer client.
//!
//! Everything here is written for clarity over speed; nothing is
//! constant-time. Do not hold real money with it.
//!
//! ## Example
//!
//! ```
//! use satoshi_core::keys::PrivateKey;
//!
//! let key = PrivateKey::from_mastering_vector();
//! let address = key.public_key().address(true, false);
//! assert_eq!(address, "14cxpo3MBCYYWCgF74SWTdcmxipnGUsPw3");
//! ```

pub mod address;
pub mod block;
pub mod constants;
pub mod curve;
pub mod ecdsa;
pub mod entropy;
pub mod error;
pub mod field;
pub mod hashes;
pub mod keys;
pub mod network;
pub mod script;
pub mod sha256;
pub mod transaction;

pub use block::Block;
pub use curve::{Curve, Point};
pub use ecdsa::Signature;
pub use error::{CoreError, Result};
pub use field::FieldElement;
pub use keys::{PrivateKey, PublicKey};
pub use network::SimpleNode;
pub use script::Script;
pub use transaction::{MapFetcher, Tx, TxFetcher, TxIn, TxOut};
