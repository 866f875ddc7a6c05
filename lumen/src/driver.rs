use std::future::Future;
use std::sync::Arc;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, ExecResult, QueryResult, Statement,
    StatementBuilder,
};

use crate::config::Config;
use crate::error::{LumenError, Result};

/// Connection wrapper that every builder executes through.
///
/// Adds statement logging when `debug` is set, the optional per-statement
/// timeout, and maps driver errors into [`LumenError`]. Clones share one
/// connection.
#[derive(Clone)]
pub struct Driver {
    conn: Arc<DatabaseConnection>,
    config: Arc<Config>,
}

impl Driver {
    pub fn new(conn: DatabaseConnection, config: Config) -> Self {
        Self::shared(Arc::new(conn), config)
    }

    pub fn shared(conn: Arc<DatabaseConnection>, config: Config) -> Self {
        Self {
            conn,
            config: Arc::new(config),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> DbBackend {
        self.conn.get_database_backend()
    }

    pub fn support_returning(&self) -> bool {
        self.conn.support_returning()
    }

    /// Same connection, statement logging switched on
    pub fn debug(&self) -> Self {
        let config = self.config.as_ref().clone().with_debug(true);
        Self::shared(Arc::clone(&self.conn), config)
    }

    pub fn build<S: StatementBuilder>(&self, stmt: &S) -> Statement {
        self.backend().build(stmt)
    }

    pub async fn query(&self, stmt: Statement) -> Result<Vec<QueryResult>> {
        self.log(&stmt);
        self.timed(self.conn.query_all(stmt)).await
    }

    pub async fn exec(&self, stmt: Statement) -> Result<ExecResult> {
        self.log(&stmt);
        self.timed(self.conn.execute(stmt)).await
    }

    fn log(&self, stmt: &Statement) {
        if self.config.debug {
            log::debug!(target: "lumen::driver", "{} args={:?}", stmt.sql, stmt.values);
        } else {
            log::trace!(target: "lumen::driver", "{}", stmt.sql);
        }
    }

    async fn timed<T>(&self, fut: impl Future<Output = std::result::Result<T, DbErr>>) -> Result<T> {
        let res = match self.config.statement_timeout() {
            Some(after) => match tokio::time::timeout(after, fut).await {
                Ok(res) => res,
                Err(_) => {
                    log::warn!(target: "lumen::driver", "statement timed out after {:?}", after);
                    return Err(LumenError::Timeout { after });
                }
            },
            None => fut.await,
        };
        res.map_err(|err| {
            log::warn!(target: "lumen::driver", "driver error: {}", err);
            LumenError::from_driver(err)
        })
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("backend", &self.backend())
            .field("config", &self.config)
            .finish()
    }
}
