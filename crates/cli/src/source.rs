use sheetsync::providers::db::postgres::PostgresSource;
use sheetsync::providers::db::sqlite::SqliteSource;
use sheetsync::providers::db::RowSource;
use sheetsync::SyncError;
use std::time::Duration;
use tracing::info;

/// The database behind `DB_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Postgres(String),
    /// A SQLite file path, or `:memory:`.
    Sqlite(String),
}

impl SourceKind {
    /// `sqlite:` URLs and paths ending in a SQLite extension select SQLite;
    /// everything else is handed to the Postgres driver.
    pub fn from_url(db_url: &str) -> Self {
        let db_url = db_url.trim();
        if let Some(path) = db_url
            .strip_prefix("sqlite://")
            .or_else(|| db_url.strip_prefix("sqlite:"))
        {
            return SourceKind::Sqlite(path.to_string());
        }
        let looks_like_file = db_url == ":memory:"
            || [".db", ".sqlite", ".sqlite3"]
                .iter()
                .any(|ext| db_url.ends_with(ext));
        if looks_like_file && !db_url.contains("://") {
            SourceKind::Sqlite(db_url.to_string())
        } else {
            SourceKind::Postgres(db_url.to_string())
        }
    }
}

/// Opens the row source for `db_url`. Postgres connects lazily.
pub async fn connect_source(
    db_url: &str,
    connect_timeout: Duration,
) -> Result<Box<dyn RowSource>, SyncError> {
    match SourceKind::from_url(db_url) {
        SourceKind::Postgres(url) => {
            info!("Using Postgres source.");
            Ok(Box::new(PostgresSource::connect_lazy(&url, connect_timeout)?))
        }
        SourceKind::Sqlite(path) => {
            info!("Using SQLite source at '{path}'.");
            Ok(Box::new(SqliteSource::new(&path).await?))
        }
    }
}
