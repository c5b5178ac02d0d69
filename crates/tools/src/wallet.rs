//! Deterministic account derivation from a recovery phrase.
//!
//! Accounts follow the standard Ethereum path `m/44'/60'/0'/0/{index}`, the
//! same derivation hardware wallets and Truffle's HD wallet provider use.

use alloy::primitives::Address;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};

use crate::config::RecoveryPhrase;
use crate::error::DiagnosticError;

const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Signers derived from a recovery phrase.
///
/// Only addresses are ever exposed; nothing here signs.
pub struct DerivedWallet {
    signers: Vec<PrivateKeySigner>,
}

impl DerivedWallet {
    /// Derive `count` accounts starting at index 0
    pub fn derive(phrase: &RecoveryPhrase, count: u32) -> Result<Self, DiagnosticError> {
        let words = phrase.word_count();
        if !VALID_WORD_COUNTS.contains(&words) {
            return Err(DiagnosticError::invalid_recovery_phrase(format!(
                "recovery phrase has {} words, expected 12, 15, 18, 21 or 24",
                words
            )));
        }

        let normalized = phrase
            .expose()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut signers = Vec::with_capacity(count as usize);
        for index in 0..count.max(1) {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(normalized.as_str())
                .index(index)
                .and_then(|builder| builder.build())
                .map_err(|e| {
                    DiagnosticError::invalid_recovery_phrase(format!(
                        "recovery phrase rejected (bad word or checksum): {}",
                        e
                    ))
                })?;
            signers.push(signer);
        }

        tracing::debug!(accounts = signers.len(), "derived wallet accounts");
        Ok(Self { signers })
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.signers.len()
    }
}
