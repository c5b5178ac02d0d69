//! The diagnostic run: config probe, connection, chain reads, contract reads.
//!
//! Checks run strictly in sequence. A failed check never stops independent
//! checks; checks that need its output are recorded as skipped.

use std::fmt;
use tracing::{debug, info, warn};

use crate::chain::{parse_address, AccountInfo, ChainInspector, ChainStatus};
use crate::config::{ConfigIssue, ConfigKey, ConfigProbe, EnvironmentConfig, NetworkMode, Settings};
use crate::contract::{ContractProbe, DeploymentRegistry};
use crate::error::{DiagnosticError, ErrorKind};
use crate::report::{DiagnosticOutcome, DiagnosticReport};
use crate::rpc::{ConnectTarget, NetworkHandle, RpcConnector, TransportFactory};

/// Check names as they appear in the report
pub mod checks {
    pub const CONNECT: &str = "rpc.connect";
    pub const CHAIN_STATUS: &str = "chain.status";
    pub const ACCOUNTS: &str = "chain.accounts";
    pub const EXPECTED_ACCOUNT: &str = "chain.expected_account";
    pub const BALANCE: &str = "chain.balance";
    pub const CONTRACT_RESOLVE: &str = "contract.resolve";
    pub const CONTRACT_OWNER: &str = "contract.owner";
    pub const CONTRACT_COUNT: &str = "contract.count";

    /// Report name of a config key check
    pub fn config(env_var: &str) -> String {
        format!("config.{}", env_var)
    }
}

const FAUCET_URL: &str = "https://sepoliafaucet.com/";

/// Pipeline progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ConfigChecked,
    Connected,
    ChainInspected,
    ContractInspected,
    Reported,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ConfigChecked => "config_checked",
            Stage::Connected => "connected",
            Stage::ChainInspected => "chain_inspected",
            Stage::ContractInspected => "contract_inspected",
            Stage::Reported => "reported",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Which groups of checks a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub config: bool,
    pub status: bool,
    pub accounts: bool,
    pub balance: bool,
    pub contract: bool,
}

impl Plan {
    /// Every check
    pub fn full() -> Self {
        Self {
            config: true,
            status: true,
            accounts: true,
            balance: true,
            contract: true,
        }
    }

    /// Environment variables only
    pub fn check_env() -> Self {
        Self {
            config: true,
            status: false,
            accounts: false,
            balance: false,
            contract: false,
        }
    }

    /// Local chain accounts and status
    pub fn verify_local() -> Self {
        Self {
            config: false,
            status: true,
            accounts: true,
            balance: true,
            contract: false,
        }
    }

    /// Remote provider connectivity and the derived account
    pub fn test_remote() -> Self {
        Self::verify_local()
    }

    /// Contract owner and counter, plus balance and status
    pub fn interact() -> Self {
        Self {
            config: false,
            status: true,
            accounts: false,
            balance: true,
            contract: true,
        }
    }

    pub fn needs_connection(&self) -> bool {
        self.status || self.accounts || self.balance || self.contract
    }
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: DiagnosticReport,
    /// Stage where the first failure happened
    pub failed_at: Option<Stage>,
    pub chain_status: Option<ChainStatus>,
    pub account: Option<AccountInfo>,
}

impl PipelineRun {
    /// Terminal stage of the run
    pub fn stage(&self) -> Stage {
        if self.failed_at.is_some() {
            Stage::Failed
        } else {
            Stage::Reported
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

struct Tracker {
    stage: Stage,
    failed_at: Option<Stage>,
    report: DiagnosticReport,
}

impl Tracker {
    fn advance(&mut self, to: Stage) {
        debug!(from = %self.stage, to = %to, "pipeline stage");
        self.stage = to;
    }

    fn record(&mut self, name: impl Into<String>, outcome: impl Into<DiagnosticOutcome>) {
        let name = name.into();
        let outcome = outcome.into();
        match &outcome {
            DiagnosticOutcome::Passed { detail } => debug!(check = %name, detail = %detail, "check passed"),
            DiagnosticOutcome::Failed { kind, message, .. } => {
                warn!(check = %name, kind = %kind, message = %message, "check failed");
                if self.failed_at.is_none() {
                    self.failed_at = Some(self.stage);
                }
            }
            DiagnosticOutcome::Skipped { kind, upstream } => {
                debug!(check = %name, kind = %kind, upstream = %upstream, "check skipped")
            }
        }
        self.report.record(name, outcome);
    }

    fn skip(&mut self, names: &[&str], kind: ErrorKind, upstream: &str) {
        for name in names {
            self.record(
                *name,
                DiagnosticOutcome::Skipped {
                    kind,
                    upstream: upstream.to_string(),
                },
            );
        }
    }
}

/// One diagnostic run over explicit inputs
pub struct Pipeline<'a, F: TransportFactory> {
    env: &'a EnvironmentConfig,
    settings: &'a Settings,
    connector: &'a RpcConnector<F>,
    registry: &'a dyn DeploymentRegistry,
    plan: Plan,
    issues: &'a [ConfigIssue],
}

impl<'a, F: TransportFactory> Pipeline<'a, F> {
    pub fn new(
        env: &'a EnvironmentConfig,
        settings: &'a Settings,
        connector: &'a RpcConnector<F>,
        registry: &'a dyn DeploymentRegistry,
        plan: Plan,
    ) -> Self {
        Self {
            env,
            settings,
            connector,
            registry,
            plan,
            issues: &[],
        }
    }

    /// Values that were replaced by defaults while resolving the settings;
    /// each is reported as a failed config check
    pub fn with_config_issues(mut self, issues: &'a [ConfigIssue]) -> Self {
        self.issues = issues;
        self
    }

    /// Execute the plan. Never fails; every problem ends up in the report.
    pub async fn run(&self) -> PipelineRun {
        info!(mode = %self.settings.mode, plan = ?self.plan, "starting diagnostic run");
        let mut tracker = Tracker {
            stage: Stage::Init,
            failed_at: None,
            report: DiagnosticReport::new(),
        };
        let mut chain_status = None;
        let mut account = None;

        let missing_required = self.check_config(&mut tracker);

        if self.plan.needs_connection() {
            match self.connect(&mut tracker, missing_required).await {
                Some(handle) => {
                    tracker.advance(Stage::Connected);
                    let (status, info) = self.inspect(&mut tracker, &handle).await;
                    chain_status = status;
                    account = info;
                    handle.close();
                }
                None => {
                    let dependents = self.connection_dependents();
                    tracker.skip(&dependents, ErrorKind::ConnectionRefused, checks::CONNECT);
                }
            }
        }

        tracker.advance(Stage::Reported);
        let run = PipelineRun {
            report: tracker.report,
            failed_at: tracker.failed_at,
            chain_status,
            account,
        };
        info!(stage = %run.stage(), exit_code = run.exit_code(), "diagnostic run finished");
        run
    }

    /// Probe configuration keys and report unusable values; returns the
    /// first missing required key
    fn check_config(&self, tracker: &mut Tracker) -> Option<String> {
        let results = ConfigProbe::probe(self.env, self.settings.mode);
        let missing = results
            .iter()
            .find(|(_, r)| matches!(r, Err(e) if e.kind == ErrorKind::MissingConfig))
            .map(|(key, _)| checks::config(key.env_var()));

        if self.plan.config {
            for (key, result) in results {
                match self.issues.iter().find(|issue| issue.source == key.env_var()) {
                    Some(issue) => tracker.record(checks::config(key.env_var()), issue.to_diagnostic()),
                    None => tracker.record(checks::config(key.env_var()), result),
                }
            }
        }

        // Unusable values are failures whichever checks the plan selects
        for issue in self.issues {
            let probed = self.plan.config && ConfigKey::PROBED.iter().any(|key| key.env_var() == issue.source);
            if !probed {
                tracker.record(checks::config(&issue.source), issue.to_diagnostic());
            }
        }

        if self.plan.config || !self.issues.is_empty() {
            tracker.advance(Stage::ConfigChecked);
        }
        missing
    }

    async fn connect(&self, tracker: &mut Tracker, missing_required: Option<String>) -> Option<NetworkHandle> {
        if let Some(upstream) = missing_required {
            if self.plan.config {
                tracker.skip(&[checks::CONNECT], ErrorKind::MissingConfig, &upstream);
                return None;
            }
        }

        let target = match ConnectTarget::from_settings(self.settings) {
            Ok(target) => target,
            Err(err) => {
                tracker.record(checks::CONNECT, err);
                return None;
            }
        };

        match self.connector.connect(&target).await {
            Ok(handle) => {
                let detail = format!("{} endpoint {}", target.label(), handle.endpoint());
                tracker.record(checks::CONNECT, DiagnosticOutcome::passed(detail));
                Some(handle)
            }
            Err(err) => {
                tracker.record(checks::CONNECT, err);
                None
            }
        }
    }

    fn connection_dependents(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.plan.status {
            names.push(checks::CHAIN_STATUS);
        }
        if self.plan.accounts {
            names.push(checks::ACCOUNTS);
            if self.settings.expected_account.is_some() {
                names.push(checks::EXPECTED_ACCOUNT);
            }
        }
        if self.plan.balance {
            names.push(checks::BALANCE);
        }
        if self.plan.contract {
            names.extend([checks::CONTRACT_RESOLVE, checks::CONTRACT_OWNER, checks::CONTRACT_COUNT]);
        }
        names
    }

    async fn inspect(
        &self,
        tracker: &mut Tracker,
        handle: &NetworkHandle,
    ) -> (Option<ChainStatus>, Option<AccountInfo>) {
        let inspector = ChainInspector::new(handle);

        // Contract resolution needs the network id even when status is not reported
        let status = if self.plan.status || self.plan.contract {
            match inspector.chain_status().await {
                Ok(status) => {
                    if self.plan.status {
                        tracker.record(checks::CHAIN_STATUS, DiagnosticOutcome::passed(status.to_string()));
                    }
                    Ok(status)
                }
                Err(err) => {
                    tracker.record(checks::CHAIN_STATUS, err.clone());
                    Err(err)
                }
            }
        } else {
            Err(DiagnosticError::query_failed("chain status not requested"))
        };

        if self.plan.accounts {
            self.check_accounts(tracker, &inspector).await;
        }

        let account = if self.plan.balance {
            self.check_balance(tracker, &inspector).await
        } else {
            None
        };

        if status.is_ok() {
            tracker.advance(Stage::ChainInspected);
        }

        if self.plan.contract {
            match &status {
                Ok(status) => {
                    self.check_contract(tracker, handle, &inspector, status.network_id).await;
                    tracker.advance(Stage::ContractInspected);
                }
                Err(err) => tracker.skip(
                    &[checks::CONTRACT_RESOLVE, checks::CONTRACT_OWNER, checks::CONTRACT_COUNT],
                    err.kind,
                    checks::CHAIN_STATUS,
                ),
            }
        }

        (status.ok(), account)
    }

    async fn check_accounts(&self, tracker: &mut Tracker, inspector: &ChainInspector<'_>) {
        let listed = inspector.accounts().await.map(|accounts| {
            let rendered: Vec<String> = accounts
                .iter()
                .enumerate()
                .map(|(i, a)| format!("{}: {}", i, a.to_checksum(None)))
                .collect();
            format!("{} available [{}]", accounts.len(), rendered.join(", "))
        });
        tracker.record(checks::ACCOUNTS, listed);

        if let Some(expected) = &self.settings.expected_account {
            let found = inspector
                .expected_account_present(expected)
                .await
                .map(|address| format!("{} found", address.to_checksum(None)));
            tracker.record(checks::EXPECTED_ACCOUNT, found);
        }
    }

    /// Balance of the expected account, or of the handle's default account
    async fn check_balance(&self, tracker: &mut Tracker, inspector: &ChainInspector<'_>) -> Option<AccountInfo> {
        let result = match &self.settings.expected_account {
            Some(expected) => match parse_address(expected) {
                Ok(address) => inspector.account_info(address, true).await,
                Err(err) => Err(err),
            },
            None => inspector.default_account().await,
        };

        match result {
            Ok(info) => {
                let mut detail = info.to_string();
                if info.balance.is_zero() && self.settings.mode == NetworkMode::Remote {
                    detail.push_str(&format!(" (get testnet ETH at {})", FAUCET_URL));
                }
                tracker.record(checks::BALANCE, DiagnosticOutcome::passed(detail));
                Some(info)
            }
            Err(err) => {
                tracker.record(checks::BALANCE, err);
                None
            }
        }
    }

    async fn check_contract(
        &self,
        tracker: &mut Tracker,
        handle: &NetworkHandle,
        inspector: &ChainInspector<'_>,
        network_id: u64,
    ) {
        let probe = ContractProbe::new(handle, self.registry);
        let name = self.settings.contract.as_str();
        let expected = self.expected_owner(inspector).await;

        let snapshot = match probe.snapshot(name, network_id, expected).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracker.record(checks::CONTRACT_RESOLVE, err);
                tracker.skip(
                    &[checks::CONTRACT_OWNER, checks::CONTRACT_COUNT],
                    ErrorKind::ContractUnresolved,
                    checks::CONTRACT_RESOLVE,
                );
                return;
            }
        };
        tracker.record(
            checks::CONTRACT_RESOLVE,
            DiagnosticOutcome::passed(format!("{} at {}", snapshot.name, snapshot.address.to_checksum(None))),
        );

        let owner = snapshot.owner.and_then(|check| {
            if check.matches {
                Ok(format!("owner {} matches expected account", check.owner.to_checksum(None)))
            } else {
                Err(DiagnosticError::account_not_found(format!(
                    "owner {} is not the expected account {}",
                    check.owner.to_checksum(None),
                    check.expected.to_checksum(None)
                )))
            }
        });
        tracker.record(checks::CONTRACT_OWNER, owner);

        let count = snapshot.auxiliary_count.map(|count| match count {
            Some(n) => format!("{} rental contracts", n),
            None => "not available (contract has no getContractCount)".to_string(),
        });
        tracker.record(checks::CONTRACT_COUNT, count);
    }

    /// Configured expected account, falling back to the handle's default account
    async fn expected_owner(&self, inspector: &ChainInspector<'_>) -> Result<String, DiagnosticError> {
        if let Some(expected) = &self.settings.expected_account {
            return Ok(expected.clone());
        }
        let accounts = inspector.accounts().await?;
        accounts
            .first()
            .map(|a| a.to_checksum(None))
            .ok_or_else(|| {
                DiagnosticError::missing_config(
                    "RENTALS_EXPECTED_ACCOUNT is not defined and the handle exposes no accounts",
                )
            })
    }
}
