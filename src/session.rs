/// Scoped sessions.
///
/// A unit of work receives the connection as its only argument. The
/// connection is opened before the unit runs and closed right after it,
/// whether it returns `Ok`, returns `Err` or panics.
use crate::core::db::SqlServer;
use crate::core::Result;
use tracing::warn;

/// Opens a connection with `open`, runs `work` on it, then closes it.
///
/// An error from `work` takes precedence over an error while closing.
pub fn with_session_using<O, F, T>(open: O, work: F) -> Result<T>
where
    O: FnOnce() -> Result<SqlServer>,
    F: FnOnce(&mut SqlServer) -> Result<T>,
{
    let mut sql = open()?;
    // A panic in `work` unwinds through `sql`, whose Drop closes it.
    let result = work(&mut sql);
    match (result, sql.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), close) => {
            if let Err(close_err) = close {
                warn!("Failed to close connection after error: {}", close_err);
            }
            Err(err)
        }
    }
}

/// Runs `work` on a fresh SQL Server connection
///
/// ```no_run
/// use magical_sqlserver::{with_session, Columns, ServerConfig};
///
/// let config = ServerConfig::new("loader", "secret", "db.example.com", "sales");
/// let rows = with_session(&config, |sql| sql.select("dbo.orders", &Columns::All, None))?;
/// # Ok::<(), magical_sqlserver::Error>(())
/// ```
#[cfg(feature = "mssql")]
pub fn with_session<F, T>(config: &crate::config::ServerConfig, work: F) -> Result<T>
where
    F: FnOnce(&mut SqlServer) -> Result<T>,
{
    with_session_using(|| SqlServer::connect(config), work)
}
