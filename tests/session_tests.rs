//! Session scoping against a backend that records whether it is open

use magical_sqlserver::{
    with_session_using, Backend, Dialect, Error, Result, Row, SqlServer, Statement, Value,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Probe {
    open: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

struct RecordingBackend {
    probe: Probe,
}

impl RecordingBackend {
    fn open(probe: &Probe) -> Self {
        probe.open.store(true, Ordering::SeqCst);
        RecordingBackend {
            probe: probe.clone(),
        }
    }
}

impl Backend for RecordingBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        Ok(vec![Row::new(vec![(
            "sql".to_string(),
            Value::Text(statement.sql.clone()),
        )])])
    }

    fn execute(&mut self, _statement: &Statement) -> Result<u64> {
        Ok(1)
    }

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.probe.open.swap(false, Ordering::SeqCst) {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.probe.open.load(Ordering::SeqCst)
    }
}

fn opener(probe: &Probe) -> impl FnOnce() -> Result<SqlServer> + '_ {
    move || Ok(SqlServer::with_backend(RecordingBackend::open(probe)))
}

#[test]
fn test_closed_after_success() {
    let probe = Probe::default();
    let rows = with_session_using(opener(&probe), |sql| {
        assert!(probe.open.load(Ordering::SeqCst));
        sql.query("SELECT 1")
    })
    .unwrap();

    assert_eq!(rows[0].get("sql"), Some(&Value::Text("SELECT 1".to_string())));
    assert!(!probe.open.load(Ordering::SeqCst));
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_closed_after_error() {
    let probe = Probe::default();
    let result: Result<()> = with_session_using(opener(&probe), |sql| {
        assert!(sql.is_open());
        Err(Error::Programming("bad statement".to_string()))
    });

    assert!(matches!(result, Err(Error::Programming(_))));
    assert!(!probe.open.load(Ordering::SeqCst));
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_closed_after_panic() {
    let probe = Probe::default();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _: Result<()> = with_session_using(opener(&probe), |_| panic!("work failed"));
    }));

    assert!(outcome.is_err());
    assert!(!probe.open.load(Ordering::SeqCst));
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mutations_commit_inside_session() {
    let probe = Probe::default();
    let affected = with_session_using(opener(&probe), |sql| {
        let record = magical_sqlserver::Record::new().set("name", "Ann");
        sql.insert("dbo.users", &record)
    })
    .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
}
