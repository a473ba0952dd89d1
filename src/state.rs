// Application state management
use anyhow::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::audio::bridge::StateObserver;
use crate::audio::decoder::ChipCore;
use crate::audio::player::Player;
use crate::db::connection::DatabaseConnection;
use crate::db::operations::DbOperations;
use crate::library::Catalog;
use crate::search::{ChannelWorker, SearchPresenter};
use crate::settings::AppSettings;

pub struct AppState<C: ChipCore + 'static> {
    pub player: Arc<Mutex<Player<C>>>,
    pub search: Arc<Mutex<SearchPresenter<ChannelWorker>>>,
    pub db: DatabaseConnection,
    pub settings: Arc<Mutex<AppSettings>>,
    pub app_dir: PathBuf,
}

impl<C: ChipCore + 'static> AppState<C> {
    /// Open settings, favorites and the audio device under `app_dir`.
    ///
    /// Returns the receiver the search worker task should read requests from.
    pub fn open(
        app_dir: PathBuf,
        core: C,
        observer: StateObserver,
        initial_query: Option<String>,
    ) -> Result<(Self, UnboundedReceiver<String>)> {
        let settings = AppSettings::load(&app_dir)?;
        let db = DatabaseConnection::new(app_dir.join("chipsloth.db"))?;
        let player = Player::new(core, &settings.playback, observer)?;

        let (worker, requests) = ChannelWorker::channel();
        let search = SearchPresenter::new(worker, &settings.search, initial_query);

        info!(app_dir = ?app_dir, "Application state ready");
        let state = Self {
            player: Arc::new(Mutex::new(player)),
            search: Arc::new(Mutex::new(search)),
            db,
            settings: Arc::new(Mutex::new(settings)),
            app_dir,
        };
        Ok((state, requests))
    }

    /// Scan `root` for modules and hand the catalog to the search worker.
    pub fn load_catalog_dir(&self, root: &Path) -> Result<usize> {
        let catalog = Catalog::from_directory(root)?;
        self.search.lock().load_catalog(&catalog)?;
        Ok(catalog.len())
    }

    /// Flip the favorite flag for a canonical catalog href.
    pub fn toggle_favorite(&self, href: &str) -> Result<bool> {
        DbOperations::toggle_favorite(&self.db, href)
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.lock().save(&self.app_dir)
    }
}
