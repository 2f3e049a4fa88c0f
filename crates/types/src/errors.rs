use thiserror::Error;

// ============================================================================
// Main Error Enum
// ============================================================================

/// Error enum shared by every Otter Flow client component
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtterError {
    // ========================================================================
    // Input Validation Errors
    // ========================================================================

    /// User-entered amount could not be converted to base units
    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    /// Invalid parameter
    #[error("Invalid parameter '{parameter}': got '{value}', expected '{expected}'")]
    InvalidParameter { parameter: String, value: String, expected: String },

    /// Malformed hex address, hash or role identifier
    #[error("Invalid {kind} '{input}': {reason}")]
    InvalidHex { kind: String, input: String, reason: String },

    // ========================================================================
    // Decoding Errors
    // ========================================================================

    /// Contract return data did not match the expected layout
    #[error("Failed to decode '{context}': {reason}")]
    Decode { context: String, reason: String },

    /// Decoded record violates a domain invariant
    #[error("Malformed {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    // ========================================================================
    // Network and RPC Errors
    // ========================================================================

    /// RPC communication error
    #[error("RPC error (code {code:?}): {message}")]
    RpcError { message: String, code: Option<i64> },

    /// Network timeout
    #[error("Timed out after {timeout_ms}ms waiting for {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    // ========================================================================
    // Transaction Errors
    // ========================================================================

    /// Wallet refused or failed to submit the call
    #[error("Wallet rejected '{call}': {reason}")]
    WalletRejected { call: String, reason: String },

    /// Transaction was included but reverted
    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: String },

    /// No wallet account is connected
    #[error("No wallet connected")]
    NotConnected,

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Connected account lacks the role required by a console
    #[error("Account {account} may not use the {console} console")]
    Unauthorized { account: String, console: String },

    // ========================================================================
    // Storage and Configuration Errors
    // ========================================================================

    /// Local storage failure (transaction log persistence)
    #[error("Storage error at '{path}': {reason}")]
    Storage { path: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration for '{component}': {reason}")]
    InvalidConfiguration { component: String, reason: String },

    /// Generic error with optional context
    #[error("Error: {message}")]
    Generic { message: String, context: Option<String> },
}

impl OtterError {
    /// Create an invalid amount error
    pub fn invalid_amount(input: &str, reason: &str) -> Self {
        Self::InvalidAmount {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, value: &str, expected: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create an invalid hex error
    pub fn invalid_hex(kind: &str, input: &str, reason: &str) -> Self {
        Self::InvalidHex {
            kind: kind.to_string(),
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a decode error
    pub fn decode(context: &str, reason: &str) -> Self {
        Self::Decode {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(record: &str, reason: &str) -> Self {
        Self::MalformedRecord {
            record: record.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an RPC error
    pub fn rpc_error(message: &str, code: Option<i64>) -> Self {
        Self::RpcError {
            message: message.to_string(),
            code,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            timeout_ms,
        }
    }

    /// Create a wallet rejection error
    pub fn wallet_rejected(call: &str, reason: &str) -> Self {
        Self::WalletRejected {
            call: call.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a storage error
    pub fn storage(path: &str, reason: &str) -> Self {
        Self::Storage {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn invalid_configuration(component: &str, reason: &str) -> Self {
        Self::InvalidConfiguration {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a generic error
    pub fn generic(message: &str) -> Self {
        Self::Generic {
            message: message.to_string(),
            context: None,
        }
    }

    /// Create a generic error with context
    pub fn generic_with_context(message: &str, context: &str) -> Self {
        Self::Generic {
            message: message.to_string(),
            context: Some(context.to_string()),
        }
    }

    /// Whether the error was caught locally before anything was submitted
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. } | Self::InvalidParameter { .. } | Self::InvalidHex { .. } | Self::NotConnected
        )
    }
}

impl From<serde_json::Error> for OtterError {
    fn from(err: serde_json::Error) -> Self {
        OtterError::decode("json", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OtterError::invalid_amount("abc", "not a decimal number");
        assert_eq!(err.to_string(), "Invalid amount 'abc': not a decimal number");

        let err = OtterError::rpc_error("execution reverted", Some(3));
        assert_eq!(err.to_string(), "RPC error (code Some(3)): execution reverted");
    }

    #[test]
    fn test_validation_classification() {
        assert!(OtterError::invalid_amount("", "empty").is_validation());
        assert!(OtterError::NotConnected.is_validation());
        assert!(!OtterError::wallet_rejected("deposit", "user denied").is_validation());
        assert!(!OtterError::TransactionReverted { tx_hash: "0x01".into() }.is_validation());
    }
}
