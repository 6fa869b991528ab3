use clap::Parser;
use database::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:spendtracker.db")]
    pub database_url: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Largest accepted request body, statement uploads included.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    /// Defaults only, for tests that build routers by hand.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            port: 0,
            max_upload_bytes: 1024 * 1024,
        }
    }
}
