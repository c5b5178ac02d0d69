//! Deployed contract resolution and read-only contract probes.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::chain::parse_address;
use crate::config::Settings;
use crate::error::DiagnosticError;
use crate::rpc::NetworkHandle;

sol! {
    /// Read surface of the rental contract used by the diagnostics
    interface IRentalContract {
        function owner() external view returns (address);
        function getContractCount() external view returns (uint256);
    }
}

/// Lookup of `(contract name, network id) → deployed address`
pub trait DeploymentRegistry: Send + Sync {
    fn lookup(&self, name: &str, network_id: u64) -> Result<Address, DiagnosticError>;
}

/// Truffle build artifacts: `<dir>/<name>.json` with a `networks` map
#[derive(Debug, Clone)]
pub struct TruffleArtifacts {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    networks: HashMap<String, ArtifactNetwork>,
}

#[derive(Debug, Deserialize)]
struct ArtifactNetwork {
    address: String,
}

impl TruffleArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn read(&self, path: &Path) -> Result<Artifact, DiagnosticError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiagnosticError::contract_unresolved(format!(
                "cannot read artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            DiagnosticError::contract_unresolved(format!(
                "artifact {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })
    }
}

impl DeploymentRegistry for TruffleArtifacts {
    fn lookup(&self, name: &str, network_id: u64) -> Result<Address, DiagnosticError> {
        let path = self.artifact_path(name);
        let artifact = self.read(&path)?;
        let entry = artifact.networks.get(&network_id.to_string()).ok_or_else(|| {
            let mut known: Vec<_> = artifact.networks.keys().cloned().collect();
            known.sort();
            DiagnosticError::contract_unresolved(format!(
                "{} has not been deployed to network {} (deployed to: [{}])",
                name,
                network_id,
                known.join(", ")
            ))
        })?;
        Address::from_str(&entry.address).map_err(|e| {
            DiagnosticError::contract_unresolved(format!(
                "artifact {} records an invalid address {}: {}",
                path.display(),
                entry.address,
                e
            ))
        })
    }
}

/// Fixed address for every network, from an explicit override
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entries: HashMap<String, Address>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, address: Address) -> Self {
        self.entries.insert(name.into(), address);
        self
    }
}

impl DeploymentRegistry for StaticRegistry {
    fn lookup(&self, name: &str, _network_id: u64) -> Result<Address, DiagnosticError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| DiagnosticError::contract_unresolved(format!("no address configured for {}", name)))
    }
}

/// Stands in for an address override that does not parse, so the
/// failure is reported by the resolve check
#[derive(Debug, Clone)]
pub struct RejectedOverride {
    raw: String,
    reason: String,
}

impl DeploymentRegistry for RejectedOverride {
    fn lookup(&self, name: &str, _network_id: u64) -> Result<Address, DiagnosticError> {
        Err(DiagnosticError::contract_unresolved(format!(
            "RENTALS_CONTRACT_ADDRESS {} for {} is not a valid address: {}",
            self.raw, name, self.reason
        )))
    }
}

/// Registry for the resolved settings: the address override when set,
/// the Truffle artifacts otherwise
pub fn registry_for(settings: &Settings) -> Box<dyn DeploymentRegistry> {
    match &settings.contract_address {
        Some(raw) => match Address::from_str(raw.trim()) {
            Ok(address) => Box::new(StaticRegistry::new().with(settings.contract.clone(), address)),
            Err(e) => Box::new(RejectedOverride {
                raw: raw.clone(),
                reason: e.to_string(),
            }),
        },
        None => Box::new(TruffleArtifacts::new(settings.artifacts_dir.clone())),
    }
}

/// Owner read and comparison result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerCheck {
    pub owner: Address,
    pub expected: Address,
    pub matches: bool,
}

/// Everything read from one deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSnapshot {
    pub name: String,
    pub address: Address,
    pub owner: Result<OwnerCheck, DiagnosticError>,
    /// `Ok(None)` when the deployed contract has no counter
    pub auxiliary_count: Result<Option<U256>, DiagnosticError>,
}

/// Read-only probes against a deployed contract
pub struct ContractProbe<'a> {
    handle: &'a NetworkHandle,
    registry: &'a dyn DeploymentRegistry,
}

impl<'a> ContractProbe<'a> {
    pub fn new(handle: &'a NetworkHandle, registry: &'a dyn DeploymentRegistry) -> Self {
        Self { handle, registry }
    }

    /// Registry lookup followed by a code-presence check
    pub async fn resolve(&self, name: &str, network_id: u64) -> Result<Address, DiagnosticError> {
        let address = self.registry.lookup(name, network_id)?;
        let code = self.handle.transport().code_at(address).await.map_err(|f| {
            DiagnosticError::contract_unresolved(format!("eth_getCode for {} failed: {}", address, f))
        })?;
        if code.is_empty() {
            return Err(DiagnosticError::contract_unresolved(format!(
                "{} has not been deployed to network {}: no code at {}",
                name,
                network_id,
                address.to_checksum(None)
            )));
        }
        debug!(contract = name, address = %address, "contract resolved");
        Ok(address)
    }

    async fn call(&self, contract: Address, data: Vec<u8>) -> Result<Bytes, crate::error::TransportFault> {
        self.handle.transport().call(contract, Bytes::from(data)).await
    }

    /// `owner()`
    pub async fn owner(&self, contract: Address) -> Result<Address, DiagnosticError> {
        let data = self
            .call(contract, IRentalContract::ownerCall {}.abi_encode())
            .await
            .map_err(|f| DiagnosticError::contract_unresolved(format!("owner() failed: {}", f)))?;
        IRentalContract::ownerCall::abi_decode_returns(&data).map_err(|e| {
            DiagnosticError::contract_unresolved(format!("owner() returned undecodable data: {}", e))
        })
    }

    /// `owner()` compared against the expected account.
    ///
    /// Addresses compare as values, so letter case and the `0x` prefix of
    /// `expected` do not matter. An unparsable `expected` is an error, not a mismatch.
    pub async fn check_owner(&self, contract: Address, expected: &str) -> Result<OwnerCheck, DiagnosticError> {
        let expected = parse_address(expected)?;
        let owner = self.owner(contract).await?;
        Ok(OwnerCheck {
            owner,
            expected,
            matches: owner == expected,
        })
    }

    /// `getContractCount()`, degrading to `Ok(None)` when the contract lacks it
    pub async fn auxiliary_count(&self, contract: Address) -> Result<Option<U256>, DiagnosticError> {
        let data = match self
            .call(contract, IRentalContract::getContractCountCall {}.abi_encode())
            .await
        {
            Ok(data) => data,
            Err(fault) if fault.is_revert() => {
                debug!(error = %fault, "getContractCount() not available");
                return Ok(None);
            }
            Err(fault) => {
                return Err(DiagnosticError::contract_unresolved(format!(
                    "getContractCount() failed: {}",
                    fault
                )))
            }
        };
        if data.is_empty() {
            return Ok(None);
        }
        match IRentalContract::getContractCountCall::abi_decode_returns(&data) {
            Ok(count) => Ok(Some(count)),
            Err(e) => {
                debug!(error = %e, "getContractCount() returned unexpected data");
                Ok(None)
            }
        }
    }

    /// Resolve the contract, then read owner and counter independently.
    ///
    /// `expected_owner` may already be an error (no account to compare
    /// against); it then becomes the owner result unchanged.
    pub async fn snapshot(
        &self,
        name: &str,
        network_id: u64,
        expected_owner: Result<String, DiagnosticError>,
    ) -> Result<ContractSnapshot, DiagnosticError> {
        let address = self.resolve(name, network_id).await?;
        let owner = match expected_owner {
            Ok(expected) => self.check_owner(address, &expected).await,
            Err(err) => Err(err),
        };
        let auxiliary_count = self.auxiliary_count(address).await;
        Ok(ContractSnapshot {
            name: name.to_string(),
            address,
            owner,
            auxiliary_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigKey, EnvironmentConfig};
    use crate::error::ErrorKind;
    use alloy::primitives::address;
    use std::fs;

    #[test]
    fn test_selectors() {
        assert_eq!(IRentalContract::ownerCall::SELECTOR, [0x8d, 0xa5, 0xcb, 0x5b]);
        assert_eq!(
            IRentalContract::getContractCountCall::SELECTOR,
            [0x93, 0x99, 0x86, 0x9d]
        );
    }

    #[test]
    fn test_truffle_artifact_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("RentalContract.json"),
            r#"{
                "contractName": "RentalContract",
                "networks": {
                    "5777": { "address": "0x6DB272507Df7E9dA070F7B71d66ac7a121b88587" }
                }
            }"#,
        )
        .unwrap();

        let registry = TruffleArtifacts::new(dir.path());
        assert_eq!(
            registry.lookup("RentalContract", 5777).unwrap(),
            address!("6DB272507Df7E9dA070F7B71d66ac7a121b88587")
        );

        let err = registry.lookup("RentalContract", 11155111).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractUnresolved);
        assert!(err.message.contains("5777"));
    }

    #[test]
    fn test_truffle_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = TruffleArtifacts::new(dir.path())
            .lookup("RentalContract", 5777)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractUnresolved);
    }

    #[test]
    fn test_truffle_artifact_without_networks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("RentalContract.json"), r#"{"abi": []}"#).unwrap();
        let err = TruffleArtifacts::new(dir.path())
            .lookup("RentalContract", 5777)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractUnresolved);
    }

    #[test]
    fn test_registry_for_override() {
        let env = EnvironmentConfig::new()
            .with(ConfigKey::ContractAddress, "0x6DB272507Df7E9dA070F7B71d66ac7a121b88587");
        let settings = Settings::resolve(&env, None, None).unwrap();
        assert_eq!(
            registry_for(&settings).lookup("RentalContract", 5777).unwrap(),
            address!("6DB272507Df7E9dA070F7B71d66ac7a121b88587")
        );
    }

    #[test]
    fn test_registry_for_malformed_override_fails_lookup() {
        let env = EnvironmentConfig::new().with(ConfigKey::ContractAddress, "0x1234");
        let settings = Settings::resolve(&env, None, None).unwrap();
        let err = registry_for(&settings).lookup("RentalContract", 5777).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ContractUnresolved);
        assert!(err.message.contains("0x1234"));
    }

    #[test]
    fn test_static_registry() {
        let addr = address!("6DB272507Df7E9dA070F7B71d66ac7a121b88587");
        let registry = StaticRegistry::new().with("RentalContract", addr);
        assert_eq!(registry.lookup("RentalContract", 1).unwrap(), addr);
        assert!(registry.lookup("Other", 1).is_err());
    }
}
