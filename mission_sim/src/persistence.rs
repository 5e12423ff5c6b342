//! Pilot and campaign save files holding persistent mission variables.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sexp_core::{name_key, names_match, MissionOutcome, PersistedVariable, PersistenceSnapshot};
use thiserror::Error;

use crate::config::{RuntimeConfig, SaveFormat};
use crate::runtime::MissionSummary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotSave {
    pub pilot: String,
    pub missions_flown: u32,
    pub variables: Vec<PersistedVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSave {
    pub campaign: String,
    pub completed_missions: Vec<String>,
    pub variables: Vec<PersistedVariable>,
}

#[derive(Debug, Error)]
pub enum SaveStoreError {
    #[error("save file i/o failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode or decode json save: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode or decode binary save: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Directory of save files. Loads and commits share an in-process lock, so a
/// loader never sees one save of a commit without the other.
#[derive(Debug)]
pub struct SaveStore {
    root: PathBuf,
    format: SaveFormat,
    lock: Mutex<()>,
}

impl SaveStore {
    pub fn new(root: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            root: root.into(),
            format,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.save_dir.clone(), config.save_format)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pilot_path(&self, pilot: &str) -> PathBuf {
        self.file_path("pilot", pilot)
    }

    pub fn campaign_path(&self, campaign: &str) -> PathBuf {
        self.file_path("campaign", campaign)
    }

    /// Missing files yield an empty save.
    pub fn load_pilot(&self, pilot: &str) -> Result<PilotSave, SaveStoreError> {
        let _guard = self.guard();
        self.read_pilot(pilot)
    }

    pub fn load_campaign(&self, campaign: &str) -> Result<CampaignSave, SaveStoreError> {
        let _guard = self.guard();
        self.read_campaign(campaign)
    }

    /// Persisted values to overlay on a mission's declared defaults.
    pub fn snapshot_for(
        &self,
        pilot: &str,
        campaign: &str,
    ) -> Result<PersistenceSnapshot, SaveStoreError> {
        let _guard = self.guard();
        Ok(PersistenceSnapshot {
            player: self.read_pilot(pilot)?.variables,
            campaign: self.read_campaign(campaign)?.variables,
        })
    }

    /// Merges a finished mission's persistent variables into both saves.
    pub fn commit(
        &self,
        pilot: &str,
        campaign: &str,
        summary: &MissionSummary,
    ) -> Result<(PilotSave, CampaignSave), SaveStoreError> {
        let _guard = self.guard();

        let mut pilot_save = self.read_pilot(pilot)?;
        merge_variables(&mut pilot_save.variables, &summary.persistence.player);
        pilot_save.missions_flown += 1;

        let mut campaign_save = self.read_campaign(campaign)?;
        merge_variables(&mut campaign_save.variables, &summary.persistence.campaign);
        if summary.outcome == MissionOutcome::Success
            && !campaign_save
                .completed_missions
                .iter()
                .any(|name| names_match(name, &summary.mission))
        {
            campaign_save.completed_missions.push(summary.mission.clone());
        }

        fs::create_dir_all(&self.root).map_err(|source| SaveStoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        self.replace_both(
            (&self.pilot_path(pilot), &pilot_save),
            (&self.campaign_path(campaign), &campaign_save),
        )?;

        tracing::info!(
            target: "sexp::save",
            pilot,
            campaign,
            mission = %summary.mission,
            player_vars = pilot_save.variables.len(),
            campaign_vars = campaign_save.variables.len(),
            "save.committed"
        );
        Ok((pilot_save, campaign_save))
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_pilot(&self, pilot: &str) -> Result<PilotSave, SaveStoreError> {
        let save = self.read(&self.pilot_path(pilot))?;
        Ok(save.unwrap_or_else(|| PilotSave {
            pilot: pilot.to_string(),
            ..PilotSave::default()
        }))
    }

    fn read_campaign(&self, campaign: &str) -> Result<CampaignSave, SaveStoreError> {
        let save = self.read(&self.campaign_path(campaign))?;
        Ok(save.unwrap_or_else(|| CampaignSave {
            campaign: campaign.to_string(),
            ..CampaignSave::default()
        }))
    }

    fn file_path(&self, kind: &str, name: &str) -> PathBuf {
        self.root.join(format!(
            "{kind}_{}.{}",
            file_stem(name),
            self.format.extension()
        ))
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, SaveStoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(target: "sexp::save", path = %path.display(), "save.missing");
                return Ok(None);
            }
            Err(source) => {
                return Err(SaveStoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let decoded = match self.format {
            SaveFormat::Json => serde_json::from_slice(&bytes)?,
            SaveFormat::Bincode => bincode::deserialize(&bytes)?,
        };
        Ok(Some(decoded))
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SaveStoreError> {
        Ok(match self.format {
            SaveFormat::Json => serde_json::to_vec_pretty(value)?,
            SaveFormat::Bincode => bincode::serialize(value)?,
        })
    }

    fn staging_path(&self, path: &Path) -> PathBuf {
        path.with_extension(format!("{}.tmp", self.format.extension()))
    }

    /// Stages both files before renaming either, so a failed encode or write
    /// leaves both saves untouched.
    fn replace_both<A: Serialize, B: Serialize>(
        &self,
        (first_path, first): (&Path, &A),
        (second_path, second): (&Path, &B),
    ) -> Result<(), SaveStoreError> {
        let first_bytes = self.encode(first)?;
        let second_bytes = self.encode(second)?;
        let first_staging = self.staging_path(first_path);
        let second_staging = self.staging_path(second_path);

        let staged = fs::write(&first_staging, first_bytes)
            .map_err(|source| SaveStoreError::Io {
                path: first_staging.clone(),
                source,
            })
            .and_then(|()| {
                fs::write(&second_staging, second_bytes).map_err(|source| SaveStoreError::Io {
                    path: second_staging.clone(),
                    source,
                })
            });
        if let Err(err) = staged {
            let _ = fs::remove_file(&first_staging);
            let _ = fs::remove_file(&second_staging);
            return Err(err);
        }

        for (staging, path) in [(&first_staging, first_path), (&second_staging, second_path)] {
            fs::rename(staging, path).map_err(|source| SaveStoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Folds case like every other name lookup, then percent-encodes each byte
/// outside `[a-z0-9_-]`. Distinct folded names never share a file.
fn file_stem(name: &str) -> String {
    let folded = name_key(name);
    let mut stem = String::with_capacity(folded.len());
    for byte in folded.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02x}");
        }
    }
    stem
}

/// Replaces entries with the same name (ignoring case) and appends new ones.
fn merge_variables(existing: &mut Vec<PersistedVariable>, updates: &[PersistedVariable]) {
    for update in updates {
        match existing
            .iter_mut()
            .find(|entry| names_match(&entry.name, &update.name))
        {
            Some(entry) => *entry = update.clone(),
            None => existing.push(update.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use std::thread;

    use super::*;
    use sexp_core::VariableType;

    static NEXT_DIR: AtomicU32 = AtomicU32::new(0);

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mission_sim_saves_{}_{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn persisted(name: &str, value: &str) -> PersistedVariable {
        PersistedVariable {
            name: name.into(),
            type_tag: VariableType::Number,
            value: value.into(),
        }
    }

    fn summary(outcome: MissionOutcome, player: Vec<PersistedVariable>) -> MissionSummary {
        MissionSummary {
            mission: "Escort Duty".into(),
            outcome,
            score: 0,
            ended_at: 60.0,
            ticks: 60,
            goals: Vec::new(),
            events: Vec::new(),
            final_notifications: Vec::new(),
            persistence: PersistenceSnapshot {
                player,
                campaign: vec![persisted("convoys_saved", "1")],
            },
            swallowed_errors: 0,
        }
    }

    #[test]
    fn missing_saves_are_empty() {
        let store = SaveStore::new(scratch_dir(), SaveFormat::Json);
        let snapshot = store.snapshot_for("Maverick", "Frontier").unwrap();
        assert!(snapshot.player.is_empty());
        assert!(snapshot.campaign.is_empty());
        assert_eq!(store.load_pilot("Maverick").unwrap().pilot, "Maverick");
    }

    #[test]
    fn commits_merge_by_name() {
        for format in [SaveFormat::Json, SaveFormat::Bincode] {
            let store = SaveStore::new(scratch_dir(), format);
            store
                .commit(
                    "Maverick",
                    "Frontier",
                    &summary(MissionOutcome::Success, vec![persisted("kills", "3")]),
                )
                .unwrap();
            let (pilot, campaign) = store
                .commit(
                    "Maverick",
                    "Frontier",
                    &summary(
                        MissionOutcome::Failure,
                        vec![persisted("Kills", "5"), persisted("medals", "1")],
                    ),
                )
                .unwrap();

            assert_eq!(pilot.missions_flown, 2);
            assert_eq!(
                pilot.variables,
                vec![persisted("Kills", "5"), persisted("medals", "1")]
            );
            assert_eq!(campaign.completed_missions, vec!["Escort Duty".to_string()]);
            assert_eq!(campaign.variables.len(), 1);

            let reloaded = store.snapshot_for("maverick", "frontier").unwrap();
            assert_eq!(reloaded.player, pilot.variables);
            assert!(store.pilot_path("Maverick").exists());
            assert_eq!(
                store.pilot_path("Maverick").extension().and_then(|ext| ext.to_str()),
                Some(format.extension())
            );
            let _ = fs::remove_dir_all(store.root());
        }
    }

    #[test]
    fn pilot_save_json_layout() {
        let save = PilotSave {
            pilot: "Maverick".into(),
            missions_flown: 2,
            variables: vec![persisted("kills", "3")],
        };
        insta::assert_snapshot!(
            serde_json::to_string(&save).unwrap(),
            @r#"{"pilot":"Maverick","missions_flown":2,"variables":[{"name":"kills","type":"number","value":"3"}]}"#
        );
    }

    #[test]
    fn distinct_names_get_distinct_files() {
        let store = SaveStore::new(scratch_dir(), SaveFormat::Json);
        assert_ne!(store.pilot_path("Ice Man"), store.pilot_path("Ice_Man"));
        assert_ne!(store.pilot_path("Ηλίας"), store.pilot_path("Νίκος"));
        assert_ne!(store.pilot_path("a.b"), store.pilot_path("a%2eb"));
        assert_eq!(store.pilot_path("ICE MAN"), store.pilot_path("ice man"));
        assert_eq!(
            store.pilot_path("Ice Man").file_name().and_then(|name| name.to_str()),
            Some("pilot_ice%20man.json")
        );

        store
            .commit(
                "Ice Man",
                "Frontier",
                &summary(MissionOutcome::Success, vec![persisted("kills", "7")]),
            )
            .unwrap();
        assert!(store.load_pilot("Ice_Man").unwrap().variables.is_empty());
        assert_eq!(
            store.load_pilot("ice man").unwrap().variables,
            vec![persisted("kills", "7")]
        );
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn failed_campaign_write_leaves_pilot_save_untouched() {
        let store = SaveStore::new(scratch_dir(), SaveFormat::Json);
        store
            .commit(
                "Maverick",
                "Frontier",
                &summary(MissionOutcome::Success, vec![persisted("kills", "3")]),
            )
            .unwrap();
        let pilot_before = fs::read(store.pilot_path("Maverick")).unwrap();

        // A directory in the campaign's staging slot makes its write fail.
        let blocker = store.staging_path(&store.campaign_path("Frontier"));
        fs::create_dir_all(&blocker).unwrap();
        let result = store.commit(
            "Maverick",
            "Frontier",
            &summary(MissionOutcome::Success, vec![persisted("kills", "9")]),
        );

        assert!(matches!(result, Err(SaveStoreError::Io { .. })));
        assert_eq!(fs::read(store.pilot_path("Maverick")).unwrap(), pilot_before);
        assert_eq!(store.load_pilot("Maverick").unwrap().missions_flown, 1);
        assert!(!store.staging_path(&store.pilot_path("Maverick")).exists());
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn concurrent_loads_never_see_half_a_commit() {
        let store = Arc::new(SaveStore::new(scratch_dir(), SaveFormat::Json));
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 1..=20 {
                    let mut flight =
                        summary(MissionOutcome::Failure, vec![persisted("round", &round.to_string())]);
                    flight.persistence.campaign = vec![persisted("round", &round.to_string())];
                    store.commit("Maverick", "Frontier", &flight).unwrap();
                }
            })
        };
        for _ in 0..200 {
            let snapshot = store.snapshot_for("Maverick", "Frontier").unwrap();
            assert_eq!(snapshot.player, snapshot.campaign);
        }
        writer.join().unwrap();
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn corrupt_save_is_an_error() {
        let store = SaveStore::new(scratch_dir(), SaveFormat::Json);
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.pilot_path("Iceman"), b"{ not json").unwrap();
        assert!(matches!(
            store.load_pilot("Iceman"),
            Err(SaveStoreError::Json(_))
        ));
        let _ = fs::remove_dir_all(store.root());
    }
}
