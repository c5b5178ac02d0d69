//! Rentals Tools Library
//!
//! Diagnoses configuration and connectivity for deploying and exercising the
//! rental contract on an Ethereum-compatible network.

pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod rpc;
pub mod wallet;

pub use chain::{AccountInfo, ChainInspector, ChainStatus};
pub use config::{ConfigError, ConfigIssue, ConfigKey, ConfigProbe, EnvironmentConfig, NetworkMode, Settings};
pub use contract::{registry_for, ContractProbe, ContractSnapshot, DeploymentRegistry, StaticRegistry, TruffleArtifacts};
pub use error::{DiagnosticError, ErrorKind, TransportFault};
pub use pipeline::{Pipeline, Plan, Stage};
pub use report::{DiagnosticOutcome, DiagnosticReport};
pub use rpc::{ConnectTarget, HttpTransportFactory, NetworkHandle, RpcConnector, RpcTransport, TransportFactory};
