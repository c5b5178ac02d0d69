//! Connection establishment and the transport seam.
//!
//! The diagnostics only ever issue a handful of read-only JSON-RPC calls, so
//! they go through the small [`RpcTransport`] trait. [`HttpTransport`] backs it
//! with an `alloy` HTTP provider; tests back it with an in-memory chain.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{NetworkMode, RecoveryPhrase, Settings};
use crate::error::{DiagnosticError, TransportFault};
use crate::wallet::DerivedWallet;

/// Read-only JSON-RPC capability the diagnostics depend on
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// `net_version`
    async fn network_id(&self) -> Result<u64, TransportFault>;
    /// `eth_chainId`
    async fn chain_id(&self) -> Result<u64, TransportFault>;
    /// `eth_blockNumber`
    async fn block_number(&self) -> Result<u64, TransportFault>;
    /// `eth_getBalance` at the latest block
    async fn balance(&self, address: Address) -> Result<U256, TransportFault>;
    /// `eth_accounts`
    async fn accounts(&self) -> Result<Vec<Address>, TransportFault>;
    /// `eth_getCode` at the latest block
    async fn code_at(&self, address: Address) -> Result<Bytes, TransportFault>;
    /// `eth_call` with raw calldata
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, TransportFault>;
    /// Release the connection and any middleware polling
    fn shutdown(&self) {}
}

/// Opens transports for an endpoint
pub trait TransportFactory: Send + Sync {
    fn open(&self, endpoint: &str) -> Result<Box<dyn RpcTransport>, TransportFault>;
}

/// `alloy` HTTP provider behind the transport trait
pub struct HttpTransport {
    provider: DynProvider,
}

impl HttpTransport {
    pub fn connect(endpoint: &str) -> Result<Self, TransportFault> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| TransportFault::Other(format!("invalid endpoint URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn network_id(&self) -> Result<u64, TransportFault> {
        self.provider.get_net_version().await.map_err(fault_from)
    }

    async fn chain_id(&self) -> Result<u64, TransportFault> {
        self.provider.get_chain_id().await.map_err(fault_from)
    }

    async fn block_number(&self) -> Result<u64, TransportFault> {
        self.provider.get_block_number().await.map_err(fault_from)
    }

    async fn balance(&self, address: Address) -> Result<U256, TransportFault> {
        self.provider.get_balance(address).await.map_err(fault_from)
    }

    async fn accounts(&self) -> Result<Vec<Address>, TransportFault> {
        self.provider.get_accounts().await.map_err(fault_from)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, TransportFault> {
        self.provider.get_code_at(address).await.map_err(fault_from)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, TransportFault> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.provider.call(tx).await.map_err(fault_from)
    }
}

/// Map an alloy transport error onto the structured fault, keeping the
/// HTTP status and JSON-RPC code where alloy exposes them
fn fault_from(err: TransportError) -> TransportFault {
    match err {
        RpcError::ErrorResp(payload) => TransportFault::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        RpcError::Transport(TransportErrorKind::HttpError(http)) => TransportFault::Http {
            status: http.status,
            body: http.body,
        },
        RpcError::Transport(kind) => TransportFault::Unreachable(kind.to_string()),
        other => TransportFault::Other(other.to_string()),
    }
}

/// Opens [`HttpTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn open(&self, endpoint: &str) -> Result<Box<dyn RpcTransport>, TransportFault> {
        Ok(Box::new(HttpTransport::connect(endpoint)?))
    }
}

/// Connection target, one variant per way the tool can reach a chain
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Local chain; accounts come from the node
    Local { endpoint: String },
    /// Remote provider; no accounts available
    RemoteWithKey { endpoint: String },
    /// Remote provider with accounts derived from a recovery phrase
    RemoteWithKeyAndWallet {
        endpoint: String,
        phrase: RecoveryPhrase,
        accounts: u32,
    },
}

impl ConnectTarget {
    /// Choose the target for the resolved settings.
    ///
    /// Performs no network access; a missing or empty API key is rejected here.
    pub fn from_settings(settings: &Settings) -> Result<Self, DiagnosticError> {
        match settings.mode {
            NetworkMode::Local => Ok(ConnectTarget::Local {
                endpoint: settings.rpc_url.clone(),
            }),
            NetworkMode::Remote => {
                let key = match settings.api_key.as_deref() {
                    None => {
                        return Err(DiagnosticError::invalid_credential(
                            "INFURA_API_KEY is not defined (invalid project id / invalid API key)",
                        ))
                    }
                    Some(key) => key,
                };
                validate_api_key(key)?;
                let endpoint = settings.provider_endpoint(key);
                match &settings.mnemonic {
                    Some(phrase) => Ok(ConnectTarget::RemoteWithKeyAndWallet {
                        endpoint,
                        phrase: phrase.clone(),
                        accounts: settings.derived_accounts,
                    }),
                    None => Ok(ConnectTarget::RemoteWithKey { endpoint }),
                }
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ConnectTarget::Local { endpoint }
            | ConnectTarget::RemoteWithKey { endpoint }
            | ConnectTarget::RemoteWithKeyAndWallet { endpoint, .. } => endpoint,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectTarget::Local { .. } => "local",
            ConnectTarget::RemoteWithKey { .. } => "remote",
            ConnectTarget::RemoteWithKeyAndWallet { .. } => "remote+wallet",
        }
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectTarget({} {})", self.label(), self.endpoint())
    }
}

/// Infura project ids are 32 hex characters; other providers use
/// alphanumeric keys, so only the character set and emptiness are enforced
fn validate_api_key(key: &str) -> Result<(), DiagnosticError> {
    if key.is_empty() {
        return Err(DiagnosticError::invalid_credential(
            "INFURA_API_KEY is empty (invalid project id / invalid API key)",
        ));
    }
    if key.contains("YOUR_") || key.contains('<') {
        return Err(DiagnosticError::invalid_credential(format!(
            "INFURA_API_KEY still holds a placeholder: {} (invalid API key)",
            key
        )));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(DiagnosticError::invalid_credential(format!(
            "INFURA_API_KEY has characters no provider key uses: {} (invalid API key)",
            key
        )));
    }
    Ok(())
}

/// Connected client owned by a single diagnostic run
pub struct NetworkHandle {
    transport: Box<dyn RpcTransport>,
    wallet: Option<DerivedWallet>,
    endpoint: String,
    closed: bool,
}

impl NetworkHandle {
    pub fn new(transport: Box<dyn RpcTransport>, wallet: Option<DerivedWallet>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            wallet,
            endpoint: endpoint.into(),
            closed: false,
        }
    }

    pub fn transport(&self) -> &dyn RpcTransport {
        self.transport.as_ref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Accounts available through this handle.
    ///
    /// With wallet middleware these are the derived accounts, otherwise the
    /// node's `eth_accounts`.
    pub async fn accounts(&self) -> Result<Vec<Address>, TransportFault> {
        match &self.wallet {
            Some(wallet) => Ok(wallet.addresses()),
            None => self.transport.accounts().await,
        }
    }

    /// Stop the transport and middleware
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.shutdown();
            debug!(endpoint = %self.endpoint, "network handle closed");
        }
    }
}

impl Drop for NetworkHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkHandle")
            .field("endpoint", &self.endpoint)
            .field("wallet_accounts", &self.wallet.as_ref().map(|w| w.len()))
            .field("closed", &self.closed)
            .finish()
    }
}

/// Builds [`NetworkHandle`]s
pub struct RpcConnector<F = HttpTransportFactory> {
    factory: F,
}

impl Default for RpcConnector<HttpTransportFactory> {
    fn default() -> Self {
        Self::new(HttpTransportFactory)
    }
}

impl<F: TransportFactory> RpcConnector<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Open a handle for the target and probe it once with `net_version`.
    ///
    /// # Errors
    ///
    /// - `InvalidCredential` for a rejected key or malformed recovery phrase
    /// - `ConnectionRefused` when the endpoint cannot be reached
    pub async fn connect(&self, target: &ConnectTarget) -> Result<NetworkHandle, DiagnosticError> {
        let wallet = match target {
            ConnectTarget::RemoteWithKeyAndWallet { phrase, accounts, .. } => {
                Some(DerivedWallet::derive(phrase, *accounts)?)
            }
            _ => None,
        };

        let endpoint = target.endpoint();
        let transport = self
            .factory
            .open(endpoint)
            .map_err(|fault| fault.into_connect_error(endpoint))?;

        match transport.network_id().await {
            Ok(network_id) => {
                info!(target = target.label(), endpoint = %endpoint, network_id, "connected");
                Ok(NetworkHandle::new(transport, wallet, endpoint))
            }
            Err(fault) => {
                transport.shutdown();
                let err = fault.into_connect_error(endpoint);
                warn!(target = target.label(), endpoint = %endpoint, error = %err, "connection failed");
                Err(err)
            }
        }
    }
}
