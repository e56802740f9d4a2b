use encore_ports::model::{ChallengeScore, Composition};
use encore_ports::storage::{
    CompositionStore, GameSettings, ScoreStore, SettingsStore, StorageError,
};
use encore_ports::types::{CompositionId, PostId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON files under one base directory:
///
/// - `settings.json`
/// - `compositions/<post id>.json`
/// - `scores/<composition id>.json`, an array appended per submission
pub struct FsStorage {
    base_dir: PathBuf,
    score_lock: Mutex<()>,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            score_lock: Mutex::new(()),
        }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("Encore"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    fn composition_path(&self, post: &PostId) -> PathBuf {
        self.base_dir
            .join("compositions")
            .join(format!("{}.json", file_stem(&post.0)))
    }

    fn scores_path(&self, composition: &CompositionId) -> PathBuf {
        self.base_dir
            .join("scores")
            .join(format!("{}.json", file_stem(&composition.0)))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::Io(e.to_string()),
        })?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base_dir)
    }
}

impl SettingsStore for FsStorage {
    fn load_settings(&self) -> Result<GameSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(GameSettings::default());
        }
        Self::read_json(&path)
    }

    fn save_settings(&self, s: &GameSettings) -> Result<(), StorageError> {
        let path = self.settings_path();
        Self::write_json(&path, s)
    }
}

impl CompositionStore for FsStorage {
    fn fetch_composition(&self, post: &PostId) -> Result<Composition, StorageError> {
        Self::read_json(&self.composition_path(post))
    }

    fn save_composition(
        &self,
        post: &PostId,
        composition: &Composition,
    ) -> Result<(), StorageError> {
        let path = self.composition_path(post);
        Self::write_json(&path, composition)?;
        debug!(post = %post, path = %path.display(), "composition written");
        Ok(())
    }
}

impl ScoreStore for FsStorage {
    fn submit_score(
        &self,
        composition: &CompositionId,
        score: &ChallengeScore,
    ) -> Result<(), StorageError> {
        let _guard = self.score_lock.lock();
        let path = self.scores_path(composition);
        let mut scores: Vec<ChallengeScore> = match Self::read_json(&path) {
            Ok(scores) => scores,
            Err(StorageError::NotFound(_)) => Vec::new(),
            Err(err) => return Err(err),
        };
        scores.push(score.clone());
        Self::write_json(&path, &scores)?;
        debug!(composition = %composition, count = scores.len(), "score appended");
        Ok(())
    }

    fn scores_for(&self, composition: &CompositionId) -> Result<Vec<ChallengeScore>, StorageError> {
        match Self::read_json(&self.scores_path(composition)) {
            Ok(scores) => Ok(scores),
            Err(StorageError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => {
                warn!(composition = %composition, %err, "unreadable score file");
                Err(err)
            }
        }
    }
}

/// Identifiers come from the platform; keep them from escaping the directory.
/// Ids that needed rewriting get a digest suffix so `a/b` and `a_b` stay apart.
fn file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !stem.is_empty() && stem == id {
        return stem;
    }

    let digest = Sha256::digest(id.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{stem}-{suffix}")
}
