use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use debtline_crypto::{KeystreamSealer, PlaintextSealer, Sealer};
use debtline_ledger::{DebtLedger, LedgerConfig, LedgerSnapshot, PayloadMode};
use debtline_types::AccountId;
use serde::{Deserialize, Serialize};

/// On-disk layout of a state file.
#[derive(Serialize, Deserialize)]
struct StateFile {
    /// Hex sealing key, present in ciphertext mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sealing_key: Option<String>,
    ledger: LedgerSnapshot,
}

/// A ledger loaded from a state file, plus the key its CLI seals with.
pub struct Workspace {
    path: PathBuf,
    ledger: DebtLedger,
    sealing_key: Option<[u8; 32]>,
}

impl Workspace {
    /// Create a new state file. Fails if one exists and `force` is unset.
    pub fn create(
        path: &Path,
        owner: AccountId,
        config: LedgerConfig,
        force: bool,
    ) -> anyhow::Result<Self> {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        let sealing_key = match config.payload_mode {
            PayloadMode::Plaintext => None,
            PayloadMode::Ciphertext => Some(KeystreamSealer::generate().0),
        };
        let ledger = DebtLedger::new(owner, config)?;
        let workspace = Self {
            path: path.to_path_buf(),
            ledger,
            sealing_key,
        };
        workspace.save()?;
        Ok(workspace)
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = read_state_file(path)?;
        let sealing_key = file
            .sealing_key
            .as_deref()
            .map(decode_key)
            .transpose()?;
        let ledger = DebtLedger::restore(file.ledger)
            .with_context(|| format!("{} failed integrity checks", path.display()))?;
        tracing::debug!(path = %path.display(), "state loaded");
        Ok(Self {
            path: path.to_path_buf(),
            ledger,
            sealing_key,
        })
    }

    pub fn ledger(&self) -> &DebtLedger {
        &self.ledger
    }

    /// Write the ledger back. The new contents replace the old file in a
    /// single rename.
    pub fn save(&self) -> anyhow::Result<()> {
        let file = StateFile {
            sealing_key: self.sealing_key.map(hex::encode),
            ledger: self.ledger.snapshot()?,
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }

    /// The sealer matching the ledger's payload mode.
    pub fn sealer(&self) -> anyhow::Result<Box<dyn Sealer>> {
        match self.ledger.config().payload_mode {
            PayloadMode::Plaintext => Ok(Box::new(PlaintextSealer)),
            PayloadMode::Ciphertext => match self.sealing_key {
                Some(key) => Ok(Box::new(KeystreamSealer::new(key))),
                None => bail!("state file has no sealing key for ciphertext mode"),
            },
        }
    }
}

/// The stored snapshot, without restoring or validating it.
pub fn read_snapshot(path: &Path) -> anyhow::Result<LedgerSnapshot> {
    Ok(read_state_file(path)?.ledger)
}

fn read_state_file(path: &Path) -> anyhow::Result<StateFile> {
    let source = fs::read_to_string(path).with_context(|| {
        format!(
            "cannot read {} (run `debtline init` first)",
            path.display()
        )
    })?;
    serde_json::from_str(&source)
        .with_context(|| format!("{} is not a debtline state file", path.display()))
}

fn decode_key(s: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(s).context("sealing key is not hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("sealing key must be 32 bytes, got {}", b.len()))
}

#[cfg(test)]
mod tests {
    use debtline_ledger::{Call, DebtReader, DebtWriter};
    use debtline_types::{DebtStatus, Timestamp};

    use super::*;

    fn owner() -> AccountId {
        AccountId::from_label("owner")
    }

    #[test]
    fn create_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let workspace = Workspace::create(&path, owner(), LedgerConfig::default(), false).unwrap();

        let sealer = workspace.sealer().unwrap();
        let call = Call::new(AccountId::from_label("debtor"), Timestamp::from_secs(10));
        let id = workspace
            .ledger()
            .create_debt(&call, sealer.seal(1_000), sealer.seal(500), 365, false)
            .unwrap();
        workspace.save().unwrap();

        let reopened = Workspace::open(&path).unwrap();
        let info = reopened.ledger().debt_info(&owner(), id).unwrap();
        assert_eq!(info.status, DebtStatus::Active);
        assert_eq!(reopened.sealer().unwrap().open(&info.amount).unwrap(), 1_000);
        assert_eq!(reopened.ledger().owner().unwrap(), owner());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        Workspace::create(&path, owner(), LedgerConfig::default(), false).unwrap();
        assert!(Workspace::create(&path, owner(), LedgerConfig::default(), false).is_err());
        Workspace::create(&path, owner(), LedgerConfig::default(), true).unwrap();
    }

    #[test]
    fn ciphertext_mode_persists_its_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = LedgerConfig {
            payload_mode: PayloadMode::Ciphertext,
            ..Default::default()
        };
        let workspace = Workspace::create(&path, owner(), config, false).unwrap();
        let sealed = workspace.sealer().unwrap().seal(42);
        assert_eq!(sealed.len(), KeystreamSealer::sealed_len());

        let reopened = Workspace::open(&path).unwrap();
        assert_eq!(reopened.sealer().unwrap().open(&sealed).unwrap(), 42);
    }

    #[test]
    fn open_rejects_missing_and_tampered_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert!(Workspace::open(&path).is_err());

        let workspace = Workspace::create(&path, owner(), LedgerConfig::default(), false).unwrap();
        let call = Call::new(AccountId::from_label("debtor"), Timestamp::from_secs(10));
        workspace
            .ledger()
            .create_debt(&call, PlaintextSealer.seal(5), PlaintextSealer.seal(5), 30, false)
            .unwrap();
        workspace.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"remaining_term_days\": 30", "\"remaining_term_days\": 31"))
            .unwrap();
        assert!(Workspace::open(&path).is_err());
        assert!(!read_snapshot(&path).unwrap().validate().is_valid());

        fs::write(&path, "not json").unwrap();
        assert!(Workspace::open(&path).is_err());
    }
}
