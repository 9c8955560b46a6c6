//! The surface front ends talk to.
//!
//! `UserDataContext` exposes the current records and flags as getters and
//! the user-facing operations as async actions. Actions never fail: results
//! come back as outcome enums and failures are recorded in `State::error`.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::{AuthState, SessionData};
use crate::cache::versioned::DEFAULT_CACHE_CAPACITY;
use crate::cache::{FileStore, LocalMirror, VersionedCache};
use crate::clock::{system_clock, SharedClock};
use crate::config::Config;
use crate::models::{DietPlan, ProgressData, ProgressPatch, QuizData, Section, WorkoutPlan};
use crate::remote::HttpDocumentStore;
use crate::store::{Action, DataSource, State, Store};
use crate::sync::{LoadOutcome, PlanOutcome, SessionHandles, SyncOutcome, SyncService};

/// Local mirror subdirectory inside the per-user cache directory.
const MIRROR_DIR: &str = "mirror";

/// Builds the handles for a session, or for the signed-out view when
/// `session` is `None`.
pub trait SessionBinder: Send + Sync {
    fn bind(&self, session: Option<&SessionData>) -> SessionHandles;
}

/// Per-user file mirror and bearer-token clients from a `Config`.
pub struct ConfigBinder {
    config: Config,
    remote: HttpDocumentStore,
    api: ApiClient,
    clock: SharedClock,
}

impl ConfigBinder {
    pub fn new(config: &Config, clock: SharedClock) -> Result<Self> {
        let remote = HttpDocumentStore::new(ApiClient::new(&config.remote_base_url)?)
            .with_poll_interval(config.poll_interval());
        let api = ApiClient::new(&config.api_base_url)?;
        Ok(Self {
            config: config.clone(),
            remote,
            api,
            clock,
        })
    }

    fn mirror_for(&self, user_id: Option<&str>) -> LocalMirror {
        let store = self
            .config
            .cache_dir(user_id)
            .and_then(|dir| FileStore::new(dir.join(MIRROR_DIR)));
        let mirror = match store {
            Ok(store) => LocalMirror::new(Arc::new(store)),
            Err(e) => {
                warn!(?user_id, error = %e, "Mirror directory unavailable, mirroring in memory");
                LocalMirror::in_memory()
            }
        };
        mirror.with_clock(self.clock.clone())
    }
}

impl SessionBinder for ConfigBinder {
    fn bind(&self, session: Option<&SessionData>) -> SessionHandles {
        let (remote, api) = match session {
            Some(session) => (
                self.remote.with_token(&session.token),
                self.api.with_token(&session.token),
            ),
            None => (self.remote.clone(), self.api.clone()),
        };
        SessionHandles {
            remote: Arc::new(remote),
            mirror: self.mirror_for(session.map(|s| s.user_id.as_str())),
            api: Some(api),
        }
    }
}

pub struct UserDataContext {
    sync: RwLock<SyncService>,
    store: Arc<Store>,
    binder: Option<Arc<dyn SessionBinder>>,
    demo_mode: bool,
}

impl UserDataContext {
    pub fn new(sync: SyncService) -> Self {
        Self {
            store: sync.store().clone(),
            sync: RwLock::new(sync),
            binder: None,
            demo_mode: false,
        }
    }

    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    /// Rebuild the remote and mirror handles whenever the user changes.
    pub fn with_binder(mut self, binder: Arc<dyn SessionBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Wire the HTTP store, plan backend and file-backed mirror from `config`.
    pub fn from_config(config: &Config, session: Option<&SessionData>) -> Result<Self> {
        let clock = system_clock();
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(DEFAULT_CACHE_CAPACITY);
        let store = Arc::new(Store::new(State::new(VersionedCache::new(capacity, clock.clone()))));

        let binder = Arc::new(ConfigBinder::new(config, clock.clone())?);
        let handles = binder.bind(session);
        let mut sync = SyncService::new(store, handles.remote, handles.mirror)
            .with_collection(&config.collection)
            .with_clock(clock);
        if let Some(api) = handles.api {
            sync = sync.with_api(api);
        }

        debug!(
            remote = %config.remote_base_url,
            collection = %config.collection,
            demo_mode = config.demo_mode,
            "Context configured"
        );
        Ok(Self::new(sync)
            .with_demo_mode(config.demo_mode)
            .with_binder(binder))
    }

    /// The service bound to the current session.
    pub fn sync(&self) -> SyncService {
        self.sync.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn mirror(&self) -> LocalMirror {
        self.sync().mirror().clone()
    }

    fn bind_session(&self, session: Option<&SessionData>) {
        let Some(binder) = &self.binder else {
            return;
        };
        let handles = binder.bind(session);
        let mut sync = self.sync.write().unwrap_or_else(|e| e.into_inner());
        *sync = sync.rebind(handles);
        debug!(user_id = ?session.map(|s| s.user_id.as_str()), "Session handles bound");
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub async fn quiz_data(&self) -> Option<QuizData> {
        self.store().read(|s| s.quiz_data.clone()).await
    }

    pub async fn diet_plan(&self) -> Option<DietPlan> {
        self.store().read(|s| s.diet_plan.clone()).await
    }

    pub async fn workout_plan(&self) -> Option<WorkoutPlan> {
        self.store().read(|s| s.workout_plan.clone()).await
    }

    pub async fn progress_data(&self) -> Option<ProgressData> {
        self.store().read(|s| s.progress_data.clone()).await
    }

    pub async fn loading_quiz_data(&self) -> bool {
        self.store().read(|s| s.loading_quiz_data).await
    }

    pub async fn loading_plans(&self) -> bool {
        self.store().read(|s| s.loading_plans).await
    }

    pub async fn is_generating_plans(&self) -> bool {
        self.store().read(|s| s.is_generating_plans).await
    }

    pub async fn is_online(&self) -> bool {
        self.store().read(|s| s.is_online).await
    }

    pub async fn error(&self) -> Option<String> {
        self.store().read(|s| s.error.clone()).await
    }

    pub async fn auth(&self) -> AuthState {
        self.store().read(|s| s.auth.clone()).await
    }

    pub async fn data_source(&self) -> Option<DataSource> {
        self.store().read(|s| s.data_source).await
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.store().read(|s| s.last_sync).await
    }

    pub async fn snapshot(&self) -> State {
        self.store().snapshot().await
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// React to the identity provider. `Some` loads and subscribes for that
    /// user; `None` behaves like `sign_out`.
    pub async fn handle_auth_change(&self, session: Option<SessionData>) -> LoadOutcome {
        let Some(session) = session else {
            self.sign_out().await;
            return LoadOutcome::SignedOut;
        };

        let (previous, source) = self
            .store()
            .read(|s| (s.user_id().map(str::to_string), s.data_source))
            .await;
        self.sync().generation().bump();

        // Records held for anyone else, demo data included, must not be
        // served from cache to this session.
        let same_user = previous.as_deref() == Some(session.user_id.as_str());
        if !same_user || source == Some(DataSource::Demo) {
            info!(from = ?previous, to = %session.user_id, "Starting session");
            self.sync().unsubscribe_all().await;
            self.store().dispatch(Action::Reset).await;
        }
        if !same_user {
            self.bind_session(Some(&session));
        }

        info!(user_id = %session.user_id, "Signed in");
        self.store()
            .dispatch(Action::AuthChanged(Some(session.clone())))
            .await;

        let sync = self.sync();
        let outcome = sync.load_user_data(Some(&session)).await;
        if outcome == LoadOutcome::Cancelled {
            return outcome;
        }

        if let Err(e) = sync.subscribe_to_user_data(&session).await {
            warn!(user_id = %session.user_id, error = %e, "Failed to subscribe to user data");
        }
        outcome
    }

    /// Drop the session: cancel in-flight work, tear down every listener
    /// once, clear state. In demo mode the sample document is shown.
    /// Returns how many listeners were torn down.
    pub async fn sign_out(&self) -> usize {
        let sync = self.sync();
        sync.generation().bump();
        let torn_down = sync.unsubscribe_all().await;
        self.store()
            .dispatch_all([Action::Reset, Action::AuthChanged(None)])
            .await;
        self.bind_session(None);
        info!(torn_down, "Signed out");

        if self.demo_mode {
            self.load_demo().await;
        }
        torn_down
    }

    async fn load_demo(&self) {
        let Some(document) = self.mirror().load_demo_document() else {
            debug!("Demo mode on but no demo document stored");
            return;
        };
        let mut actions: Vec<Action> = document.records().into_iter().map(Action::set_record).collect();
        actions.push(Action::DataSourceResolved(DataSource::Demo));
        self.store().dispatch_all(actions).await;
        info!("Demo document loaded");
    }

    // =========================================================================
    // Data Actions
    // =========================================================================

    pub async fn load_user_data(&self) -> LoadOutcome {
        let session = self.store().read(|s| s.auth.session().cloned()).await;
        self.sync().load_user_data(session.as_ref()).await
    }

    pub async fn sync_data(&self) -> SyncOutcome {
        self.sync().sync_data().await
    }

    pub async fn generate_plans(&self) -> PlanOutcome {
        self.sync().generate_plans().await
    }

    pub async fn update_progress_data(&self, patch: ProgressPatch) -> SyncOutcome {
        if patch.is_empty() {
            debug!("Empty progress patch, nothing to do");
            return SyncOutcome::Skipped;
        }
        self.sync().update_progress_data(patch).await
    }

    /// Record connectivity. Coming back online pushes held data.
    pub async fn set_online(&self, online: bool) -> SyncOutcome {
        let was_online = self.is_online().await;
        self.store().dispatch(Action::SetOnline(online)).await;

        if online && !was_online {
            info!("Back online, syncing");
            return self.sync().sync_data().await;
        }
        SyncOutcome::Skipped
    }

    pub async fn clear_error(&self) {
        self.store().dispatch(Action::SetError(None)).await;
    }

    /// Drop cached entries for `section`, or all of them.
    pub async fn invalidate_cache(&self, section: Option<Section>) {
        self.store().dispatch(Action::InvalidateCache(section)).await;
    }
}
