//! Unified error types for the Safe coordinator
//!
//! Every failure flows through [`CoordinatorError`] so callers always learn
//! which stage failed and, where relevant, which signer was involved.
//! Nothing in the crate retries on its own.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all coordinator operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    pub signer: Option<Address>,
    pub stage: Option<Stage>,
}

impl CoordinatorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            signer: None,
            stage: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Attach a stage unless an inner call already recorded a more precise one.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn unsupported_recovery_byte(v: u8) -> Self {
        Self::new(
            ErrorCode::UnsupportedRecoveryByte,
            format!("signing primitive returned recovery byte {} (0x{:02x})", v, v),
        )
    }

    pub fn duplicate_signer(signer: Address) -> Self {
        Self::new(
            ErrorCode::DuplicateSigner,
            format!("conflicting signatures for signer {:?}", signer),
        )
        .with_signer(signer)
    }

    pub fn approval_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApprovalRejected, msg)
    }

    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, msg)
    }

    /// The verifier refused the operation. `reason` is the verifier's revert
    /// string when one was returned.
    pub fn execution_reverted(reason: Option<String>) -> Self {
        let message = match &reason {
            Some(reason) => format!("execution reverted: {}", reason),
            None => "execution reverted".to_string(),
        };
        let err = Self::new(ErrorCode::ExecutionReverted, message);
        match reason {
            Some(reason) => err.with_details(reason),
            None => err,
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransportError, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn digest_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DigestMismatch, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Revert reason reported by the verifier, if any.
    pub fn revert_reason(&self) -> Option<&str> {
        match self.code {
            ErrorCode::ExecutionReverted | ErrorCode::ApprovalRejected => self.details.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(stage) = self.stage {
            write!(f, " stage={}", stage)?;
        }
        if let Some(signer) = self.signer {
            write!(f, " signer={:?}", signer)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoordinatorError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Caller errors
    InvalidInput,
    ConfigError,

    // Signing errors
    UnsupportedRecoveryByte,
    SigningFailed,
    DigestMismatch,

    // Aggregation errors
    DuplicateSigner,

    // On-chain approval errors
    ApprovalRejected,
    ProviderUnavailable,

    // Submission errors
    ExecutionReverted,
    TransportError,

    // Parse errors
    ParseError,

    // Internal
    Internal,
}

/// Pipeline stage at which an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Build,
    Digest,
    Sign,
    Approve,
    Collect,
    Aggregate,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Build => "build",
            Stage::Digest => "digest",
            Stage::Sign => "sign",
            Stage::Approve => "approve",
            Stage::Collect => "collect",
            Stage::Aggregate => "aggregate",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// Result type alias for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

// Conversions from common error types

impl From<serde_json::Error> for CoordinatorError {
    fn from(e: serde_json::Error) -> Self {
        CoordinatorError::new(ErrorCode::ParseError, format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for CoordinatorError {
    fn from(e: hex::FromHexError) -> Self {
        CoordinatorError::new(ErrorCode::InvalidInput, format!("invalid hex: {}", e))
    }
}

impl From<reqwest::Error> for CoordinatorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CoordinatorError::transport("request timed out")
        } else if e.is_connect() {
            CoordinatorError::transport("connection failed").with_details(e.to_string())
        } else {
            CoordinatorError::transport(e.to_string())
        }
    }
}

impl From<ethers_signers::WalletError> for CoordinatorError {
    fn from(e: ethers_signers::WalletError) -> Self {
        CoordinatorError::signing_failed(e.to_string())
    }
}

impl From<ethers_core::abi::Error> for CoordinatorError {
    fn from(e: ethers_core::abi::Error) -> Self {
        CoordinatorError::parse_error(format!("ABI error: {}", e))
    }
}

impl From<secp256k1::Error> for CoordinatorError {
    fn from(e: secp256k1::Error) -> Self {
        CoordinatorError::signing_failed(format!("secp256k1 error: {}", e))
    }
}

impl From<url::ParseError> for CoordinatorError {
    fn from(e: url::ParseError) -> Self {
        CoordinatorError::config(format!("invalid URL: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = CoordinatorError::execution_reverted(Some("GS020".to_string()))
            .with_stage(Stage::Submit);

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("execution_reverted"));
        assert!(json.contains("GS020"));
        assert!(json.contains("submit"));
    }

    #[test]
    fn test_stage_is_not_overwritten() {
        let err = CoordinatorError::approval_rejected("GS030")
            .with_stage(Stage::Approve)
            .with_stage(Stage::Collect);
        assert_eq!(err.stage, Some(Stage::Approve));
    }

    #[test]
    fn test_display_includes_signer_and_stage() {
        let signer = Address::repeat_byte(0x11);
        let err = CoordinatorError::duplicate_signer(signer).with_stage(Stage::Aggregate);
        let text = err.to_string();
        assert!(text.contains("DuplicateSigner"));
        assert!(text.contains("stage=aggregate"));
        assert!(text.contains("0x1111"));
    }

    #[test]
    fn test_revert_reason() {
        let err = CoordinatorError::execution_reverted(Some("GS026".into()));
        assert_eq!(err.revert_reason(), Some("GS026"));
        assert_eq!(CoordinatorError::execution_reverted(None).revert_reason(), None);
        assert_eq!(CoordinatorError::transport("down").revert_reason(), None);
    }
}
