//! Local key-value persistence with guarded reads and writes.
//!
//! `LocalMirror` keeps a same-machine copy of the user's records so the app
//! can fall back to it when the remote store is unreachable, and serves the
//! demo document for anonymous sessions. Read failures (missing file,
//! malformed JSON) are logged and treated as absence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::clock::{system_clock, SharedClock};
use crate::models::{DietPlan, ProgressData, QuizData, Record, Section, UserDocument, Versioned, WorkoutPlan};

use super::entry::CachedData;
use super::versioned::DEFAULT_ENTRY_VERSION;

/// Key holding the sample document shown to anonymous users.
pub const DEMO_DOCUMENT_KEY: &str = "demoUserData";

/// Minimal string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create local store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read local file: {}", key))?;
        Ok(Some(contents))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.path(key), value)
            .with_context(|| format!("Failed to write local file: {}", key))
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-process storage for tests and throwaway demo runs.
#[derive(Default, Clone)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        items.remove(key);
        Ok(())
    }
}

/// Typed, failure-tolerant view over a `KeyValueStore`.
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn KeyValueStore>,
    clock: SharedClock,
}

impl LocalMirror {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Load and parse `key`. Any failure is logged and reported as `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let contents = match self.store.get_item(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read local mirror");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!(key, error = %e, "Malformed local mirror data, ignoring");
                None
            }
        }
    }

    /// Serialize and store `data`. Returns whether the write landed.
    pub fn save<T: Serialize>(&self, key: &str, data: &T, version: u64) -> bool {
        let cached = CachedData::new(data, version, self.clock.now());
        let contents = match serde_json::to_string_pretty(&cached) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize local mirror data");
                return false;
            }
        };
        match self.store.set_item(key, &contents) {
            Ok(()) => {
                debug!(key, version, "Mirrored locally");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to write local mirror");
                false
            }
        }
    }

    fn save_versioned<T: Serialize + Versioned>(&self, section: Section, data: &T) -> bool {
        let version = data.version().unwrap_or(DEFAULT_ENTRY_VERSION);
        self.save(section.field_name(), data, version)
    }

    // ===== Quiz Data =====

    pub fn load_quiz_data(&self) -> Option<CachedData<QuizData>> {
        self.load(Section::Quiz.field_name())
    }

    pub fn save_quiz_data(&self, quiz: &QuizData) -> bool {
        self.save_versioned(Section::Quiz, quiz)
    }

    // ===== Diet Plan =====

    pub fn load_diet_plan(&self) -> Option<CachedData<DietPlan>> {
        self.load(Section::DietPlan.field_name())
    }

    pub fn save_diet_plan(&self, plan: &DietPlan) -> bool {
        self.save_versioned(Section::DietPlan, plan)
    }

    // ===== Workout Plan =====

    pub fn load_workout_plan(&self) -> Option<CachedData<WorkoutPlan>> {
        self.load(Section::WorkoutPlan.field_name())
    }

    pub fn save_workout_plan(&self, plan: &WorkoutPlan) -> bool {
        self.save_versioned(Section::WorkoutPlan, plan)
    }

    // ===== Progress =====

    pub fn load_progress_data(&self) -> Option<CachedData<ProgressData>> {
        self.load(Section::Progress.field_name())
    }

    pub fn save_progress_data(&self, progress: &ProgressData) -> bool {
        self.save_versioned(Section::Progress, progress)
    }

    /// Mirror any record under its section key.
    pub fn save_record(&self, record: &Record) -> bool {
        match record {
            Record::Quiz(quiz) => self.save_quiz_data(quiz),
            Record::DietPlan(plan) => self.save_diet_plan(plan),
            Record::WorkoutPlan(plan) => self.save_workout_plan(plan),
            Record::Progress(progress) => self.save_progress_data(progress),
        }
    }

    // ===== Whole document =====

    /// Everything mirrored, assembled as a document. `None` when nothing is stored.
    pub fn load_document(&self) -> Option<UserDocument> {
        let doc = UserDocument {
            quiz_data: self.load_quiz_data().map(|c| c.data),
            diet_plan: self.load_diet_plan().map(|c| c.data),
            workout_plan: self.load_workout_plan().map(|c| c.data),
            progress_data: self.load_progress_data().map(|c| c.data),
        };
        if doc.is_empty() {
            None
        } else {
            Some(doc)
        }
    }

    pub fn save_document(&self, doc: &UserDocument) {
        if let Some(ref quiz) = doc.quiz_data {
            self.save_quiz_data(quiz);
        }
        if let Some(ref plan) = doc.diet_plan {
            self.save_diet_plan(plan);
        }
        if let Some(ref plan) = doc.workout_plan {
            self.save_workout_plan(plan);
        }
        if let Some(ref progress) = doc.progress_data {
            self.save_progress_data(progress);
        }
    }

    pub fn load_demo_document(&self) -> Option<UserDocument> {
        self.load(DEMO_DOCUMENT_KEY).map(|c| c.data)
    }

    pub fn save_demo_document(&self, doc: &UserDocument) -> bool {
        self.save(DEMO_DOCUMENT_KEY, doc, DEFAULT_ENTRY_VERSION)
    }

    /// Drop every mirrored record. The demo document stays.
    pub fn clear_user_data(&self) {
        for section in Section::ALL {
            if let Err(e) = self.store.remove_item(section.field_name()) {
                warn!(key = section.field_name(), error = %e, "Failed to clear local mirror");
            }
        }
    }

    // ===== Age Information =====

    /// Helper to load a mirror entry for display without caring about its type
    fn load_age(&self, section: Section) -> Option<String> {
        self.load::<serde_json::Value>(section.field_name())
            .map(|cached| cached.age_display(self.clock.now()))
    }

    pub fn mirror_ages(&self) -> MirrorAges {
        MirrorAges {
            quiz_data: self.load_age(Section::Quiz),
            diet_plan: self.load_age(Section::DietPlan),
            workout_plan: self.load_age(Section::WorkoutPlan),
            progress_data: self.load_age(Section::Progress),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MirrorAges {
    pub quiz_data: Option<String>,
    pub diet_plan: Option<String>,
    pub workout_plan: Option<String>,
    pub progress_data: Option<String>,
}

impl MirrorAges {
    /// Age of the first mirrored record found, or "never"
    pub fn last_updated(&self) -> String {
        [&self.quiz_data, &self.diet_plan, &self.workout_plan, &self.progress_data]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
