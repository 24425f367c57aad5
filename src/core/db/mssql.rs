/// SQL Server Backend Module
///
/// A `Backend` speaking TDS through `tiberius`. The driver is async; this
/// backend owns a current-thread tokio runtime and blocks on every call so the
/// rest of the crate stays synchronous.

use crate::config::ServerConfig;
use crate::core::db::backend::{Backend, Dialect};
use crate::core::db::builder::Statement;
use crate::core::{Error, Result, Row, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

type TdsClient = Client<Compat<TcpStream>>;

impl ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Value::Null => ColumnData::String(None),
            Value::Integer(i) => ColumnData::I64(Some(*i)),
            Value::Real(r) => ColumnData::F64(Some(*r)),
            Value::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Blob(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            Value::Boolean(b) => ColumnData::Bit(Some(*b)),
        }
    }
}

fn from_column_data(data: ColumnData<'static>) -> Result<Value> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Integer(v.into())),
        ColumnData::I16(v) => v.map(|v| Value::Integer(v.into())),
        ColumnData::I32(v) => v.map(|v| Value::Integer(v.into())),
        ColumnData::I64(v) => v.map(Value::Integer),
        ColumnData::F32(v) => v.map(|v| Value::Real(v.into())),
        ColumnData::F64(v) => v.map(Value::Real),
        ColumnData::Bit(v) => v.map(Value::Boolean),
        ColumnData::String(v) => v.map(|s| Value::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())),
        ColumnData::Binary(v) => v.map(|b| Value::Blob(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| Value::Text(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| Value::Text(x.into_owned().into_string())),
        data @ (ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_)) => {
            NaiveDateTime::from_sql(&data)?.map(|d| Value::Text(d.to_string()))
        }
        data @ ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map(|d| Value::Text(d.to_string())),
        data @ ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map(|t| Value::Text(t.to_string())),
        data @ ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(&data)?.map(|d| Value::Text(d.to_rfc3339()))
        }
        #[allow(unreachable_patterns)]
        other => Some(Value::Text(format!("{:?}", other))),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn from_tds_row(row: tiberius::Row) -> Result<Row> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut fields = Vec::with_capacity(columns.len());
    for (name, data) in columns.into_iter().zip(row) {
        fields.push((name, from_column_data(data)?));
    }
    Ok(Row::new(fields))
}

async fn open_client(config: &ServerConfig) -> Result<TdsClient> {
    let mut tds = tiberius::Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    if config.trust_cert {
        tds.trust_cert();
    }

    let tcp = TcpStream::connect(tds.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Ok(Client::connect(tds, tcp.compat_write()).await?)
}

/// SQL Server session
pub struct MssqlBackend {
    runtime: Runtime,
    client: Option<TdsClient>,
}

impl MssqlBackend {
    /// Connects and authenticates with SQL Server credentials
    pub fn connect(config: &ServerConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        info!(
            "Connecting to SQL Server {}:{} database {}",
            config.host, config.port, config.database
        );
        let client = runtime.block_on(open_client(config))?;
        Ok(MssqlBackend {
            runtime,
            client: Some(client),
        })
    }

    /// Sends `sql` as a plain batch instead of an `sp_executesql` call.
    ///
    /// Transaction control must go this way: SQL Server rejects an RPC that
    /// leaves `@@TRANCOUNT` different from how it found it (Msg 266).
    fn run_batch(&mut self, sql: &str) -> Result<()> {
        let sql = simple_batch(sql)?;
        let client = self.client.as_mut().ok_or(Error::Closed)?;
        debug!("batch: {}", sql);
        self.runtime.block_on(async {
            client.simple_query(sql).await?.into_results().await?;
            Ok::<(), tiberius::error::Error>(())
        })?;
        Ok(())
    }
}

/// Checks that `sql` can run as a plain batch. Batches carry no parameters,
/// so placeholders would reach the server unbound.
fn simple_batch(sql: &str) -> Result<&str> {
    if sql.contains("@P") {
        Err(Error::Programming(format!(
            "batch statement cannot bind parameters: {}",
            sql
        )))
    } else {
        Ok(sql)
    }
}

impl Backend for MssqlBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        let client = self.client.as_mut().ok_or(Error::Closed)?;
        let params: Vec<&dyn ToSql> = statement.params.iter().map(|v| v as &dyn ToSql).collect();

        let rows = self.runtime.block_on(async {
            let stream = client.query(statement.sql.as_str(), &params).await?;
            stream.into_first_result().await
        })?;
        rows.into_iter().map(from_tds_row).collect()
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let client = self.client.as_mut().ok_or(Error::Closed)?;
        let params: Vec<&dyn ToSql> = statement.params.iter().map(|v| v as &dyn ToSql).collect();

        let result = self
            .runtime
            .block_on(client.execute(statement.sql.as_str(), &params))?;
        Ok(result.total())
    }

    fn begin(&mut self) -> Result<()> {
        self.run_batch(Dialect::SqlServer.begin_sql())
    }

    fn commit(&mut self) -> Result<()> {
        self.run_batch(Dialect::SqlServer.commit_sql())
    }

    fn rollback(&mut self) -> Result<()> {
        self.run_batch(Dialect::SqlServer.rollback_sql())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            debug!("Closing SQL Server connection");
            self.runtime.block_on(client.close())?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }
}

impl std::fmt::Debug for MssqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlBackend")
            .field("open", &self.client.is_some())
            .finish()
    }
}
