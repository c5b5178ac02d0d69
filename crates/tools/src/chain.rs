//! Read-only chain queries over a connected handle.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::DiagnosticError;
use crate::rpc::NetworkHandle;

/// Network id and block height read at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    /// `net_version`
    pub network_id: u64,
    /// `eth_chainId`, when the node answers it
    pub chain_id: Option<u64>,
    pub block_number: u64,
}

impl ChainStatus {
    /// Human name of well-known networks
    pub fn network_label(&self) -> Option<&'static str> {
        network_label(self.network_id)
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "network id {}", self.network_id)?;
        if let Some(label) = self.network_label() {
            write!(f, " ({})", label)?;
        }
        if let Some(chain_id) = self.chain_id.filter(|c| *c != self.network_id) {
            write!(f, ", chain id {}", chain_id)?;
        }
        write!(f, ", block {}", self.block_number)
    }
}

pub fn network_label(network_id: u64) -> Option<&'static str> {
    match network_id {
        1 => Some("Mainnet"),
        11155111 => Some("Sepolia"),
        17000 => Some("Holesky"),
        1337 | 5777 => Some("Ganache"),
        31337 => Some("Hardhat"),
        _ => None,
    }
}

/// Account address and balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    /// Balance in wei
    pub balance: U256,
    /// Whether this account was named in the configuration
    pub expected: bool,
}

impl AccountInfo {
    /// EIP-55 checksum form
    pub fn checksum_address(&self) -> String {
        self.address.to_checksum(None)
    }

    pub fn balance_ether(&self) -> String {
        display_ether(self.balance)
    }
}

impl fmt::Display for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ETH", self.checksum_address(), self.balance_ether())
    }
}

/// Wei to ether with trailing zeros trimmed; zero renders as `0`
pub fn display_ether(wei: U256) -> String {
    let formatted = format_ether(wei);
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a configured address, case-insensitively
pub fn parse_address(raw: &str) -> Result<Address, DiagnosticError> {
    Address::from_str(raw.trim()).map_err(|e| {
        DiagnosticError::account_not_found(format!("{} is not a valid account address: {}", raw, e))
    })
}

/// Point-in-time chain reads; every call goes to the node
pub struct ChainInspector<'a> {
    handle: &'a NetworkHandle,
}

impl<'a> ChainInspector<'a> {
    pub fn new(handle: &'a NetworkHandle) -> Self {
        Self { handle }
    }

    /// Network id and block height
    pub async fn chain_status(&self) -> Result<ChainStatus, DiagnosticError> {
        let transport = self.handle.transport();
        let network_id = transport
            .network_id()
            .await
            .map_err(|f| f.into_query_error("net_version"))?;
        let block_number = transport
            .block_number()
            .await
            .map_err(|f| f.into_query_error("eth_blockNumber"))?;
        let chain_id = match transport.chain_id().await {
            Ok(id) => Some(id),
            Err(fault) => {
                debug!(error = %fault, "eth_chainId unavailable");
                None
            }
        };

        Ok(ChainStatus {
            network_id,
            chain_id,
            block_number,
        })
    }

    /// Accounts exposed by the handle (derived or node-managed)
    pub async fn accounts(&self) -> Result<Vec<Address>, DiagnosticError> {
        self.handle
            .accounts()
            .await
            .map_err(|f| f.into_query_error("eth_accounts"))
    }

    /// Balance of an explicit address
    pub async fn account_info(&self, address: Address, expected: bool) -> Result<AccountInfo, DiagnosticError> {
        let balance = self
            .handle
            .transport()
            .balance(address)
            .await
            .map_err(|f| f.into_query_error("eth_getBalance"))?;
        Ok(AccountInfo {
            address,
            balance,
            expected,
        })
    }

    /// Account at `index` of the handle's account list
    pub async fn account_at(&self, index: usize) -> Result<AccountInfo, DiagnosticError> {
        let accounts = self.accounts().await?;
        let address = accounts.get(index).copied().ok_or_else(|| {
            DiagnosticError::account_not_found(format!(
                "no account at index {} ({} accounts available)",
                index,
                accounts.len()
            ))
        })?;
        self.account_info(address, false).await
    }

    /// First account of the handle, the default for address-needing reads
    pub async fn default_account(&self) -> Result<AccountInfo, DiagnosticError> {
        self.account_at(0).await
    }

    /// Confirm an expected address is among the handle's accounts
    pub async fn expected_account_present(&self, expected: &str) -> Result<Address, DiagnosticError> {
        let address = parse_address(expected)?;
        let accounts = self.accounts().await?;
        if accounts.contains(&address) {
            Ok(address)
        } else {
            Err(DiagnosticError::account_not_found(format!(
                "{} is not among the {} available accounts",
                address.to_checksum(None),
                accounts.len()
            )))
        }
    }
}
