use std::path::PathBuf;

use clap::Args;

use margins_api::ApiConfig;

/// Secrets that are only fit for local development.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

/// Server settings. Every flag can also come from the environment or `.env`.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "MARGINS_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value = "5000", env = "MARGINS_PORT")]
    pub port: u16,

    /// SQLite database file
    #[arg(long, default_value = "margins.db", env = "MARGINS_DB_PATH")]
    pub db_path: PathBuf,

    /// Session signing secret
    #[arg(long, default_value = "dev-secret-change-me", env = "MARGINS_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Directory holding audio_manifest.json, build_info.json and static/
    #[arg(long, default_value = ".", env = "MARGINS_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Built frontend to serve, with index.html as the SPA fallback
    #[arg(long, env = "MARGINS_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Origin allowed to call the API with credentials
    #[arg(long, default_value = "http://localhost:5173", env = "MARGINS_FRONTEND_ORIGIN")]
    pub frontend_origin: String,

    /// Domains the audio proxy may fetch from, comma separated
    #[arg(
        long,
        default_value = "dropbox.com,dropboxusercontent.com",
        env = "MARGINS_AUDIO_HOSTS",
        value_delimiter = ','
    )]
    pub audio_hosts: Vec<String>,

    /// Title reported when there is no audio manifest
    #[arg(long, default_value = "The Enemy Within", env = "MARGINS_BOOK_TITLE")]
    pub book_title: String,

    /// File name stem of the EPUB and PDF downloads
    #[arg(long, default_value = "The_Enemy_Within", env = "MARGINS_BOOK_FILE_STEM")]
    pub book_file_stem: String,

    /// Session lifetime in days
    #[arg(
        long,
        default_value = "30",
        env = "MARGINS_SESSION_DAYS",
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub session_days: i64,

    /// Mark the session cookie Secure (set when served over HTTPS)
    #[arg(long, env = "MARGINS_COOKIE_SECURE")]
    pub cookie_secure: bool,
}

impl Config {
    pub fn uses_placeholder_secret(&self) -> bool {
        self.secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&self.secret.as_str())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            secret: self.secret.clone(),
            data_dir: self.data_dir.clone(),
            session_days: self.session_days,
            cookie_secure: self.cookie_secure,
            audio_hosts: self
                .audio_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            book_title: self.book_title.clone(),
            book_file_stem: self.book_file_stem.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        TestCli::try_parse_from(std::iter::once("margins").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn audio_hosts_split_and_normalise() {
        let config = parse(&["--audio-hosts", " Dropbox.com ,,cdn.example.org"]);
        assert_eq!(
            config.api_config().audio_hosts,
            vec!["dropbox.com".to_string(), "cdn.example.org".to_string()]
        );
    }

    #[test]
    fn placeholder_secret_is_detected() {
        let config = parse(&["--secret", "dev-secret-change-me"]);
        assert!(config.uses_placeholder_secret());

        let config = parse(&["--secret", "k3O2m9cX0fJ1s8Lq"]);
        assert!(!config.uses_placeholder_secret());
    }

    #[test]
    fn session_days_must_be_positive() {
        let parsed = TestCli::try_parse_from(["margins", "--session-days", "0"]);
        assert!(parsed.is_err());
    }
}
