use anyhow::{Context, Result};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;
use std::sync::Mutex;
use std::time::Duration;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Fixed store connection timeout, also the pool checkout timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SETUP_QUERY: &str = "PRAGMA busy_timeout = 10000;
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;";

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(SETUP_QUERY)
            .map_err(r2d2::Error::QueryError)
    }
}

/// Store handle shared by every repository.
///
/// The pool is built on first use (or by an explicit [`Database::connect`]) and then
/// kept for the lifetime of the process. Construct one per process and pass it around
/// in an `Arc`.
#[derive(Debug)]
pub struct Database {
    url: String,
    pool: Mutex<Option<Pool>>,
}

impl Database {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: Mutex::new(None),
        }
    }

    /// Return the cached pool, establishing it (and running migrations) on the first call.
    pub fn connect(&self) -> Result<Pool> {
        let mut guard = self
            .pool
            .lock()
            .map_err(|_| anyhow::anyhow!("database handle lock poisoned"))?;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let pool = establish_pool(&self.url)?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    pub fn conn(&self) -> Result<PooledConn> {
        let pool = self.connect()?;
        Ok(pool.get().context("checkout database connection")?)
    }
}

pub fn establish_pool(database_url: &str) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(4)
        .connection_timeout(CONNECT_TIMEOUT)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .with_context(|| format!("connect to database {database_url}"))?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }
    info!("database ready at {}", database_url);
    Ok(pool)
}

fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("migration error: {e}"))
}
