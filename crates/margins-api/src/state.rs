use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect;
use tracing::error;

use margins_db::Database;

use crate::audio::allowed_audio_source;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: ApiConfig,
    /// Client for the audio proxy.
    pub http: reqwest::Client,
}

/// Settings the handlers need at request time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub secret: String,
    pub data_dir: PathBuf,
    pub session_days: i64,
    pub cookie_secure: bool,
    /// Domains the audio proxy may fetch from, subdomains included.
    pub audio_hosts: Vec<String>,
    pub book_title: String,
    /// File name stem of the EPUB/PDF downloads, e.g. `The_Enemy_Within`.
    pub book_file_stem: String,
}

impl ApiConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("audio_manifest.json")
    }

    pub fn build_info_path(&self) -> PathBuf {
        self.data_dir.join("build_info.json")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("static").join("downloads")
    }

    pub fn synced_text_dir(&self) -> PathBuf {
        self.data_dir.join("static").join("synced_text")
    }

    pub fn book_file(&self, extension: &str) -> String {
        format!("{}.{}", self.book_file_stem, extension)
    }
}

const UPSTREAM_USER_AGENT: &str = "Margins-BetaReader/1.0";
const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Builder for the audio proxy's client. Redirects are followed only while
/// they stay on allow-listed hosts; leaving the list is a fetch error.
pub fn upstream_client(audio_hosts: &[String]) -> reqwest::ClientBuilder {
    let hosts = audio_hosts.to_vec();
    let policy = redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if allowed_audio_source(attempt.url().as_str(), &hosts).is_some() {
            attempt.follow()
        } else {
            let target = attempt.url().to_string();
            attempt.error(format!("redirect to {target} is not allowed"))
        }
    });

    reqwest::Client::builder()
        .user_agent(UPSTREAM_USER_AGENT)
        .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
        .redirect(policy)
}

impl AppStateInner {
    pub fn new(db: Database, config: ApiConfig) -> anyhow::Result<AppState> {
        let http = upstream_client(&config.audio_hosts).build()?;
        Ok(Self::with_client(db, config, http))
    }

    pub fn with_client(db: Database, config: ApiConfig, http: reqwest::Client) -> AppState {
        Arc::new(Self { db, config, http })
    }
}

/// Runs blocking database work off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}
