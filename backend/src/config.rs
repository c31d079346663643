// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::import::DEFAULT_KEYWORD;

/// Default cap on an uploaded bot-names file.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory uploaded bot-name files are written to before import.
    pub upload_dir: PathBuf,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    /// Directive keyword that precedes each bot name in an uploaded file.
    pub bot_name_keyword: String,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:statsadmin.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `UPLOAD_DIR` - Where uploaded files land (default: `./uploads`)
    /// - `MAX_UPLOAD_BYTES` - Upload size limit (default: 2 MiB)
    /// - `BOT_NAME_KEYWORD` - Import directive (default: `aiSettings.addBotName`)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let database_url =
            env("DATABASE_URL").unwrap_or_else(|| "sqlite:statsadmin.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let upload_dir = env("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let max_upload_bytes = env("MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let bot_name_keyword = env("BOT_NAME_KEYWORD")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_KEYWORD.to_string());

        Config {
            database_url,
            port,
            upload_dir,
            max_upload_bytes,
            bot_name_keyword,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
