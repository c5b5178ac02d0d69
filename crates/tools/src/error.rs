//! Failure taxonomy shared by every diagnostic component.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Remediation category of a failed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required configuration key is absent
    MissingConfig,
    /// API key or recovery phrase rejected or malformed
    InvalidCredential,
    /// Endpoint unreachable
    ConnectionRefused,
    /// A read-only RPC query failed after connecting
    NetworkQueryFailed,
    /// Requested account is not available on the handle
    AccountNotFound,
    /// No usable contract deployment for this network
    ContractUnresolved,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingConfig => "missing_config",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::NetworkQueryFailed => "network_query_failed",
            ErrorKind::AccountNotFound => "account_not_found",
            ErrorKind::ContractUnresolved => "contract_unresolved",
        }
    }

    /// Fixed remediation guidance printed under a failed check
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            ErrorKind::MissingConfig => &[
                "Check that the .env file is in the directory you run the tool from",
                "Check there are no spaces around '=' in lines such as INFURA_API_KEY=...",
                "Restart the terminal after editing .env",
            ],
            ErrorKind::InvalidCredential => &[
                "Go to https://infura.io/dashboard",
                "Sign in or create a free account",
                "Create a new project",
                "Copy the API key into INFURA_API_KEY in your .env",
                "Make sure Ethereum is enabled for the project",
            ],
            ErrorKind::ConnectionRefused => &[
                "Verify the local chain process (Ganache) is running",
                "Check RENTALS_RPC_URL matches the host and port it listens on",
                "For remote mode, check your network connection to the provider",
            ],
            ErrorKind::NetworkQueryFailed => &[
                "The endpoint answered the connection probe but a query failed",
                "Check the provider status page and rerun the diagnostic",
            ],
            ErrorKind::AccountNotFound => &[
                "Check RENTALS_EXPECTED_ACCOUNT is one of the chain's accounts",
                "For testnet ETH use https://sepoliafaucet.com/",
            ],
            ErrorKind::ContractUnresolved => &[
                "Run `truffle migrate --network <network>` to deploy the contract",
                "Check RENTALS_ARTIFACTS_DIR points at the build/contracts directory",
                "A restarted local chain loses its deployments; migrate again with --reset",
            ],
        }
    }
}

/// Guidance for a rejected recovery phrase, replacing the provider key steps
pub const RECOVERY_PHRASE_REMEDIATION: &[&str] = &[
    "Check MNEMONIC holds 12 or 24 words separated by single spaces",
    "Check every word comes from the BIP-39 English word list",
    "Copy the phrase again from the wallet that deployed the contract",
    "Wrap the value in double quotes in .env: MNEMONIC=\"word1 word2 ...\"",
];

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed failure of a single diagnostic operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DiagnosticError {
    pub kind: ErrorKind,
    pub message: String,
    /// Steps shown under the failure; the kind's own list unless the
    /// failing input narrows it
    pub remediation: &'static [&'static str],
}

impl DiagnosticError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            remediation: kind.remediation(),
        }
    }

    /// Malformed or rejected recovery phrase
    pub fn invalid_recovery_phrase(message: impl Into<String>) -> Self {
        Self {
            remediation: RECOVERY_PHRASE_REMEDIATION,
            ..Self::invalid_credential(message)
        }
    }

    pub fn missing_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingConfig, message)
    }

    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredential, message)
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionRefused, message)
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkQueryFailed, message)
    }

    pub fn account_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccountNotFound, message)
    }

    pub fn contract_unresolved(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContractUnresolved, message)
    }
}

/// Provider reply fragments that mean the API key was rejected
const CREDENTIAL_PATTERNS: &[&str] = &[
    "invalid project id",
    "invalid api key",
    "project id required",
    "unauthorized",
];

/// JSON-RPC error codes nodes use for a reverted `eth_call`
const REVERT_CODES: &[i64] = &[3, -32000, -32015, -32603];

/// Structured failure reported by an [`crate::rpc::RpcTransport`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFault {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("{0}")]
    Other(String),
}

impl TransportFault {
    fn message(&self) -> &str {
        match self {
            TransportFault::Unreachable(m) | TransportFault::Other(m) => m,
            TransportFault::Http { body, .. } => body,
            TransportFault::Rpc { message, .. } => message,
        }
    }

    /// Whether the provider rejected the credentials.
    ///
    /// HTTP 401/403 decide directly; reply text is matched only when no
    /// status says otherwise.
    pub fn is_credential_rejection(&self) -> bool {
        if let TransportFault::Http { status, .. } = self {
            if matches!(status, 401 | 403) {
                return true;
            }
        }
        let lowered = self.message().to_lowercase();
        CREDENTIAL_PATTERNS.iter().any(|p| lowered.contains(p))
    }

    /// Whether an `eth_call` reverted (missing function, failed require).
    pub fn is_revert(&self) -> bool {
        let lowered = self.message().to_lowercase();
        match self {
            TransportFault::Rpc { code, .. } if *code == 3 => true,
            TransportFault::Rpc { code, .. } if REVERT_CODES.contains(code) => {
                lowered.contains("revert") || lowered.contains("invalid opcode")
            }
            _ => lowered.contains("execution reverted"),
        }
    }

    /// Classify a failure observed while establishing the connection
    pub fn into_connect_error(self, endpoint: &str) -> DiagnosticError {
        if self.is_credential_rejection() {
            DiagnosticError::invalid_credential(format!(
                "provider rejected the API key (invalid project id / invalid API key): {}",
                self
            ))
        } else {
            match self {
                TransportFault::Unreachable(m) => {
                    DiagnosticError::connection_refused(format!("cannot reach {}: {}", endpoint, m))
                }
                other => DiagnosticError::connection_refused(format!(
                    "connection probe to {} failed: {}",
                    endpoint, other
                )),
            }
        }
    }

    /// Classify a failure of a read-only query on an established handle
    pub fn into_query_error(self, query: &str) -> DiagnosticError {
        DiagnosticError::query_failed(format!("{} failed: {}", query, self))
    }
}
