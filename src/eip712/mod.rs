//! EIP-712 Typed Data Hashing
//!
//! Generic typed structured data hashing plus the Safe-specific schema built
//! on top of it. The Safe digest is the value every signer in a multisig round
//! signs or approves.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use safe_coordinator::eip712::{digest, SafeTxContext};
//!
//! let hash = digest(safe_address, chain_id, &tx);
//! let ctx = SafeTxContext::new(SafeDomain::new(safe_address, chain_id), tx);
//! assert_eq!(ctx.digest(), hash);
//! ```

pub mod types;
pub mod encoder;
pub mod hasher;
pub mod safe;

pub use types::*;
pub use encoder::*;
pub use hasher::*;
pub use safe::*;

#[cfg(test)]
mod tests;
