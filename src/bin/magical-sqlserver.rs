use magical_sqlserver::config::{default_config_path, load_config, Config};
use magical_sqlserver::{Error, Record, Result, SqlServer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "Usage: magical-sqlserver [--config <path>] <command>

Commands:
  tables                           List base tables
  query <sql>                      Run SQL and print rows as JSON lines
  bulk-insert <table> <file.json>  Load a JSON array of objects with bcp";

fn connect(config: &Config) -> Result<SqlServer> {
    if let Some(sqlite) = &config.sqlite {
        info!("Opening SQLite database {}", sqlite.path.display());
        return SqlServer::open_sqlite(&sqlite.path);
    }
    match config.server() {
        #[cfg(feature = "mssql")]
        Some(server) => SqlServer::connect(&server),
        #[cfg(not(feature = "mssql"))]
        Some(_) => Err(Error::Config(
            "built without SQL Server support".to_string(),
        )),
        None => Err(Error::Config("no database configured".to_string())),
    }
}

fn read_records(path: &str) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    let items: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&content)?;
    items.into_iter().map(Record::from_json).collect()
}

fn run(args: &[String]) -> Result<()> {
    let (config_path, command) = match args {
        [flag, path, rest @ ..] if flag == "--config" => (PathBuf::from(path), rest),
        rest => (
            default_config_path()
                .ok_or_else(|| Error::Config("no config directory on this platform".to_string()))?,
            rest,
        ),
    };
    let config = load_config(&config_path)?;

    match command {
        [cmd] if cmd == "tables" => {
            let mut sql = connect(&config)?;
            for table in sql.tables()? {
                println!("{}", table);
            }
            sql.close()
        }
        [cmd, query] if cmd == "query" => {
            let mut sql = connect(&config)?;
            for row in sql.query(query)? {
                println!("{}", row.to_json());
            }
            sql.close()
        }
        [cmd, table, file] if cmd == "bulk-insert" => {
            let records = read_records(file)?;
            let mut sql = connect(&config)?;
            sql.bulk_insert(table, &records)?;
            println!("Loaded {} records into {}", records.len(), table);
            sql.close()
        }
        _ => Err(Error::Config(USAGE.to_string())),
    }
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
