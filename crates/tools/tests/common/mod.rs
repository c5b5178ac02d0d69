#![allow(dead_code)]

use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rentals_tools::config::{ConfigKey, EnvironmentConfig, Settings};
use rentals_tools::contract::IRentalContract;
use rentals_tools::error::TransportFault;
use rentals_tools::rpc::{RpcConnector, RpcTransport, TransportFactory};

pub const OWNER: Address = address!("6DB272507Df7E9dA070F7B71d66ac7a121b88587");
pub const SECOND: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const PHRASE: &str = "test test test test test test test test test test test junk";
pub const DERIVED: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// In-memory chain answering the diagnostic queries
#[derive(Clone, Default)]
pub struct MockChain {
    pub network_id: u64,
    pub chain_id: u64,
    pub block_number: u64,
    pub accounts: Vec<Address>,
    pub balances: HashMap<Address, U256>,
    pub code: HashMap<Address, Bytes>,
    pub calls: HashMap<(Address, [u8; 4]), Bytes>,
    /// Returned by every query when set
    pub fault: Option<TransportFault>,
    /// Returned by `eth_blockNumber` only
    pub block_fault: Option<TransportFault>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl MockChain {
    pub fn sepolia() -> Self {
        Self {
            network_id: 11155111,
            chain_id: 11155111,
            block_number: 6_500_000,
            ..Self::default()
        }
    }

    pub fn ganache() -> Self {
        let mut chain = Self {
            network_id: 5777,
            chain_id: 1337,
            block_number: 12,
            accounts: vec![OWNER, SECOND],
            ..Self::default()
        };
        chain.balances.insert(OWNER, U256::from(99_500_000_000_000_000_000u128));
        chain.balances.insert(SECOND, U256::from(100_000_000_000_000_000_000u128));
        chain
    }

    pub fn unreachable() -> Self {
        Self {
            fault: Some(TransportFault::Unreachable(
                "error sending request: tcp connect error: Connection refused (os error 111)".to_string(),
            )),
            ..Self::default()
        }
    }

    /// Deploy the rental contract with an owner and, optionally, the counter
    pub fn with_rental_contract(mut self, owner: Address, count: Option<u64>) -> Self {
        self.code.insert(CONTRACT, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        self.calls.insert(
            (CONTRACT, IRentalContract::ownerCall::SELECTOR),
            Bytes::copy_from_slice(owner.into_word().as_slice()),
        );
        if let Some(count) = count {
            self.calls.insert(
                (CONTRACT, IRentalContract::getContractCountCall::SELECTOR),
                Bytes::copy_from_slice(&U256::from(count).to_be_bytes::<32>()),
            );
        }
        self
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), TransportFault> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RpcTransport for MockChain {
    async fn network_id(&self) -> Result<u64, TransportFault> {
        self.check()?;
        Ok(self.network_id)
    }

    async fn chain_id(&self) -> Result<u64, TransportFault> {
        self.check()?;
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, TransportFault> {
        self.check()?;
        if let Some(fault) = &self.block_fault {
            return Err(fault.clone());
        }
        Ok(self.block_number)
    }

    async fn balance(&self, address: Address) -> Result<U256, TransportFault> {
        self.check()?;
        Ok(self.balances.get(&address).copied().unwrap_or_default())
    }

    async fn accounts(&self) -> Result<Vec<Address>, TransportFault> {
        self.check()?;
        Ok(self.accounts.clone())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, TransportFault> {
        self.check()?;
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, TransportFault> {
        self.check()?;
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        self.calls.get(&(to, selector)).cloned().ok_or(TransportFault::Rpc {
            code: -32000,
            message: "execution reverted".to_string(),
        })
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out clones of one mock chain and records the endpoints opened
pub struct MockFactory {
    pub chain: MockChain,
    pub opened: Arc<std::sync::Mutex<Vec<String>>>,
}

impl MockFactory {
    pub fn new(chain: MockChain) -> Self {
        Self {
            chain,
            opened: Arc::default(),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl TransportFactory for MockFactory {
    fn open(&self, endpoint: &str) -> Result<Box<dyn RpcTransport>, TransportFault> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(endpoint.to_string());
        }
        Ok(Box::new(self.chain.clone()))
    }
}

pub fn connector(chain: MockChain) -> RpcConnector<MockFactory> {
    RpcConnector::new(MockFactory::new(chain))
}

pub fn local_env() -> EnvironmentConfig {
    EnvironmentConfig::new().with(ConfigKey::NetworkMode, "local")
}

pub fn remote_env(api_key: &str) -> EnvironmentConfig {
    EnvironmentConfig::new()
        .with(ConfigKey::NetworkMode, "remote")
        .with(ConfigKey::ProviderApiKey, api_key)
}

pub fn settings(env: &EnvironmentConfig) -> Settings {
    Settings::resolve(env, None, None).expect("valid settings")
}
