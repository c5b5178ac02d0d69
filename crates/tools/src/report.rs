//! Aggregation of check outcomes into the final report.
//!
//! Rendering produces strings; printing is left to the caller.

use serde::Serialize;
use std::fmt::Write as _;

use crate::error::{DiagnosticError, ErrorKind};

/// Remediation lines shown per failed check
pub const MAX_REMEDIATION_LINES: usize = 5;

/// Result of a single named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Passed { detail: String },
    Failed {
        kind: ErrorKind,
        message: String,
        /// Carried for rendering; JSON attaches it next to the entry
        #[serde(skip)]
        remediation: &'static [&'static str],
    },
    /// Not attempted because a check it depends on did not pass
    Skipped { kind: ErrorKind, upstream: String },
}

impl DiagnosticOutcome {
    pub fn passed(detail: impl Into<String>) -> Self {
        DiagnosticOutcome::Passed {
            detail: detail.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, DiagnosticOutcome::Passed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DiagnosticOutcome::Failed { .. })
    }
}

impl From<DiagnosticError> for DiagnosticOutcome {
    fn from(err: DiagnosticError) -> Self {
        DiagnosticOutcome::Failed {
            kind: err.kind,
            message: err.message,
            remediation: err.remediation,
        }
    }
}

impl From<Result<String, DiagnosticError>> for DiagnosticOutcome {
    fn from(result: Result<String, DiagnosticError>) -> Self {
        match result {
            Ok(detail) => DiagnosticOutcome::passed(detail),
            Err(err) => err.into(),
        }
    }
}

/// One named check in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    pub name: String,
    #[serde(flatten)]
    pub outcome: DiagnosticOutcome,
}

/// Ordered check results of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    entries: Vec<CheckEntry>,
}

#[derive(Serialize)]
struct EntryView<'a> {
    #[serde(flatten)]
    entry: &'a CheckEntry,
    #[serde(skip_serializing_if = "no_hints")]
    remediation: &'static [&'static str],
}

fn no_hints(hints: &&'static [&'static str]) -> bool {
    hints.is_empty()
}

#[derive(Serialize)]
struct ReportView<'a> {
    passed: bool,
    checks: Vec<EntryView<'a>>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, outcome: impl Into<DiagnosticOutcome>) {
        self.entries.push(CheckEntry {
            name: name.into(),
            outcome: outcome.into(),
        });
    }

    pub fn entries(&self) -> &[CheckEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&DiagnosticOutcome> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failed())
    }

    pub fn is_success(&self) -> bool {
        !self.entries.iter().any(|e| e.outcome.is_failed())
    }

    /// 0 if no check failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Human-readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "╔════════════════════════════════════════════════════════════════╗");
        let _ = writeln!(out, "║                 RENTALS DIAGNOSTIC REPORT                      ║");
        let _ = writeln!(out, "╚════════════════════════════════════════════════════════════════╝");

        for entry in &self.entries {
            match &entry.outcome {
                DiagnosticOutcome::Passed { detail } => {
                    let _ = writeln!(out, "  ✅ {:<28} {}", entry.name, detail);
                }
                DiagnosticOutcome::Failed {
                    kind,
                    message,
                    remediation,
                } => {
                    let _ = writeln!(out, "  ❌ {:<28} [{}] {}", entry.name, kind, message);
                    for (i, hint) in remediation.iter().take(MAX_REMEDIATION_LINES).enumerate() {
                        let _ = writeln!(out, "       {}. {}", i + 1, hint);
                    }
                }
                DiagnosticOutcome::Skipped { kind, upstream } => {
                    let _ = writeln!(out, "  ⏭  {:<28} [{}] skipped, requires {}", entry.name, kind, upstream);
                }
            }
        }

        let failed = self.failures().count();
        let _ = writeln!(out, "╚════════════════════════════════════════════════════════════════╝");
        if failed == 0 {
            let _ = writeln!(out, "  🎉 All {} checks passed", self.entries.len());
        } else {
            let _ = writeln!(out, "  {} of {} checks failed", failed, self.entries.len());
        }
        out
    }

    /// Report as JSON, with remediation attached to failed checks
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let view = ReportView {
            passed: self.is_success(),
            checks: self
                .entries
                .iter()
                .map(|entry| EntryView {
                    entry,
                    remediation: match &entry.outcome {
                        DiagnosticOutcome::Failed { remediation, .. } => *remediation,
                        _ => &[],
                    },
                })
                .collect(),
        };
        serde_json::to_string_pretty(&view)
    }
}
