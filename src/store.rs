//! Serialized access to the shared SQL store.
//!
//! The store itself is treated as a black-box statement executor described by
//! [`StoreBackend`]: it can run a write statement and report how many rows were
//! affected, or run a read statement and hand back its rows in order.
//! [`SqliteStore`] is the production backend and opens a fresh SQLite handle
//! for every operation.
//!
//! All callers reach the backend through a [`StoreGuard`], which holds a
//! [`StoreLock`] for the full duration of each operation. The lock is injected
//! at construction so that every guard sharing it is serialized against every
//! other, no matter how many connections are active.
//!
//! # Ordering
//!
//! [`StoreLock`] is a ticket lock: callers are admitted to the critical section
//! in the order in which they asked for it. Waiting callers block on a
//! [`Condvar`] and never spin.
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::trace;
use rusqlite::{Connection, OpenFlags, types::ValueRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unable to open store '{path}': {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

/// Outcome of a write statement: the number of rows it touched.
pub type CommandResult = Result<usize, StoreError>;

/// Outcome of a read statement: its rows, in the order the store returned them.
pub type QueryResult = Result<Vec<Row>, StoreError>;

/// Single column value of a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Text(String),
    /// SQL `NULL`.
    Absent,
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Field::Text(value.into())
    }

    /// Text form of the value; `NULL` renders as the empty string.
    pub fn as_str(&self) -> &str {
        match self {
            Field::Text(s) => s,
            Field::Absent => "",
        }
    }
}

impl From<Option<&str>> for Field {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => Field::Text(s.to_string()),
            None => Field::Absent,
        }
    }
}

impl From<ValueRef<'_>> for Field {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Field::Absent,
            ValueRef::Integer(i) => Field::Text(i.to_string()),
            ValueRef::Real(f) => Field::Text(format!("{f:?}")),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Field::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Ordered sequence of fields returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<Field>);

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Field>> for Row {
    fn from(value: Vec<Field>) -> Self {
        Row(value)
    }
}

/// Statement executor capability exposed by the persistent store.
pub trait StoreBackend: Send + Sync {
    /// Run a write or DDL statement and commit it.
    fn execute(&self, statement: &str) -> CommandResult;

    /// Run a read statement and collect every row it yields.
    fn query(&self, statement: &str) -> QueryResult;
}

/// SQLite file backend. Each operation opens its own handle and closes it
/// before returning.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: PathBuf, busy_timeout: Duration) -> Self {
        Self { path, busy_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn =
            Connection::open_with_flags(&self.path, flags).map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;
        conn.busy_timeout(self.busy_timeout)?;
        trace!("opened store handle at {:?}", self.path);
        Ok(conn)
    }

    fn close(conn: Connection) -> Result<(), StoreError> {
        conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }
}

impl StoreBackend for SqliteStore {
    fn execute(&self, statement: &str) -> CommandResult {
        // SQLite prepares blank text into no statement at all.
        if statement.trim().is_empty() {
            return Ok(0);
        }

        let conn = self.open()?;
        let affected = conn.execute(statement, [])?;

        // A statement such as BEGIN leaves a transaction open; commit it
        // before the handle goes away.
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }

        Self::close(conn)?;
        Ok(affected)
    }

    fn query(&self, statement: &str) -> QueryResult {
        if statement.trim().is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.open()?;
        let rows = {
            let mut stmt = conn.prepare(statement)?;
            let columns = stmt.column_count();
            let mut cursor = stmt.query([])?;
            let mut rows = Vec::new();

            while let Some(row) = cursor.next()? {
                let fields = (0..columns)
                    .map(|i| row.get_ref(i).map(Field::from))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(Row::new(fields));
            }
            rows
        };

        Self::close(conn)?;
        Ok(rows)
    }
}

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// First-come-first-served mutual exclusion for store operations.
#[derive(Debug, Default)]
pub struct StoreLock {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

/// Proof of holding the [`StoreLock`]; the next waiter is admitted on drop.
#[derive(Debug)]
pub struct StoreLockGuard<'a> {
    lock: &'a StoreLock,
}

impl StoreLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> StoreLockGuard<'_> {
        let mut tickets = self.tickets();
        let ticket = tickets.next;
        tickets.next = tickets.next.wrapping_add(1);

        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }

        StoreLockGuard { lock: self }
    }

    /// Number of callers blocked waiting for the lock.
    pub fn waiting(&self) -> u64 {
        let tickets = self.tickets();
        tickets
            .next
            .wrapping_sub(tickets.serving)
            .saturating_sub(1)
    }

    fn release(&self) {
        let mut tickets = self.tickets();
        tickets.serving = tickets.serving.wrapping_add(1);
        drop(tickets);
        self.turn.notify_all();
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StoreLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// The only path to the store: every operation runs inside the shared lock.
#[derive(Debug)]
pub struct StoreGuard<B: StoreBackend> {
    backend: B,
    lock: Arc<StoreLock>,
}

impl<B: StoreBackend> StoreGuard<B> {
    pub fn new(backend: B, lock: Arc<StoreLock>) -> Self {
        Self { backend, lock }
    }

    pub fn run_command(&self, statement: &str) -> CommandResult {
        let _held = self.lock.acquire();
        trace!("store lock held for command");
        self.backend.execute(statement)
    }

    pub fn run_query(&self, statement: &str) -> QueryResult {
        let _held = self.lock.acquire();
        trace!("store lock held for query");
        self.backend.query(statement)
    }

    pub fn lock(&self) -> &Arc<StoreLock> {
        &self.lock
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }
}


#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::Ordering,
        thread,
        time::{Duration, Instant},
    };

    use tempdir::TempDir;

    use super::{mock::RecordingBackend, *};

    fn sqlite_guard(temp: &TempDir) -> StoreGuard<SqliteStore> {
        let store = SqliteStore::new(temp.path().join("sqlgate.db"), Duration::from_secs(5));
        StoreGuard::new(store, Arc::new(StoreLock::new()))
    }

    fn wait_for_waiters(lock: &StoreLock, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while lock.waiting() < count {
            assert!(Instant::now() < deadline, "waiters never queued");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn command_reports_rows_affected() {
        let temp = TempDir::new("command").unwrap();
        let guard = sqlite_guard(&temp);

        assert_eq!(guard.run_command("CREATE TABLE t (x INTEGER)").unwrap(), 0);
        assert_eq!(
            guard
                .run_command("INSERT INTO t (x) VALUES (1), (2), (3)")
                .unwrap(),
            3
        );
        assert_eq!(guard.run_command("DELETE FROM t WHERE x > 1").unwrap(), 2);
    }

    #[test]
    fn query_preserves_store_order_and_nulls() {
        let temp = TempDir::new("query").unwrap();
        let guard = sqlite_guard(&temp);

        guard
            .run_command("CREATE TABLE users (name TEXT, email TEXT, age INTEGER)")
            .unwrap();
        guard
            .run_command(
                "INSERT INTO users VALUES ('bob', 'bob@example.com', 40), ('alice', NULL, 31)",
            )
            .unwrap();

        let rows = guard
            .run_query("SELECT name, email, age FROM users ORDER BY rowid")
            .unwrap();

        assert_eq!(
            rows,
            vec![
                Row::new(vec![
                    Field::text("bob"),
                    Field::text("bob@example.com"),
                    Field::text("40")
                ]),
                Row::new(vec![Field::text("alice"), Field::Absent, Field::text("31")]),
            ]
        );
    }

    #[test]
    fn query_renders_reals_and_blobs_as_text() {
        let temp = TempDir::new("values").unwrap();
        let guard = sqlite_guard(&temp);

        let rows = guard.run_query("SELECT 1.5, 2.0, x'6869'").unwrap();

        assert_eq!(
            rows,
            vec![Row::new(vec![
                Field::text("1.5"),
                Field::text("2.0"),
                Field::text("hi")
            ])]
        );
    }

    #[test]
    fn blank_statement_is_a_no_op() {
        let temp = TempDir::new("blank").unwrap();
        let guard = sqlite_guard(&temp);

        assert_eq!(guard.run_command("").unwrap(), 0);
        assert_eq!(guard.run_command(" \n\t").unwrap(), 0);
        assert!(guard.run_query("").unwrap().is_empty());
    }

    #[test]
    fn failure_releases_lock() {
        let temp = TempDir::new("failure").unwrap();
        let guard = sqlite_guard(&temp);

        assert!(guard.run_command("SELEKT 1").is_err());
        assert!(guard.run_query("SELECT * FROM missing").is_err());
        assert_eq!(guard.lock().waiting(), 0);

        let rows = guard.run_query("SELECT 1").unwrap();
        assert_eq!(rows, vec![Row::new(vec![Field::text("1")])]);
    }

    #[test]
    fn open_transaction_is_committed() {
        let temp = TempDir::new("begin").unwrap();
        let guard = sqlite_guard(&temp);

        guard.run_command("CREATE TABLE t (x INTEGER)").unwrap();
        guard.run_command("BEGIN").unwrap();

        assert_eq!(guard.run_command("INSERT INTO t VALUES (7)").unwrap(), 1);
        assert_eq!(
            guard.run_query("SELECT x FROM t").unwrap(),
            vec![Row::new(vec![Field::text("7")])]
        );
    }

    #[test]
    fn guard_never_overlaps_operations() {
        let lock = Arc::new(StoreLock::new());
        let guard = Arc::new(StoreGuard::new(
            RecordingBackend::holding(Duration::from_millis(1)),
            Arc::clone(&lock),
        ));

        let handles = (0..8)
            .map(|i| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || {
                    for j in 0..10 {
                        if j % 2 == 0 {
                            guard.run_command(&format!("INSERT {i} {j}")).unwrap();
                        } else {
                            guard.run_query(&format!("SELECT {i} {j}")).unwrap();
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(guard.backend.statements().len(), 80);
        assert_eq!(guard.backend.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guards_sharing_a_lock_are_serialized() {
        let lock = Arc::new(StoreLock::new());
        let first = StoreGuard::new(RecordingBackend::default(), Arc::clone(&lock));
        let second = StoreGuard::new(RecordingBackend::default(), Arc::clone(&lock));

        let held = lock.acquire();
        thread::scope(|s| {
            s.spawn(|| first.run_command("INSERT 1").unwrap());
            s.spawn(|| second.run_command("INSERT 2").unwrap());

            wait_for_waiters(&lock, 2);
            assert!(first.backend.statements().is_empty());
            assert!(second.backend.statements().is_empty());
            drop(held);
        });

        assert_eq!(first.backend.statements(), vec!["INSERT 1"]);
        assert_eq!(second.backend.statements(), vec!["INSERT 2"]);
    }

    #[test]
    fn lock_admits_waiters_in_arrival_order() {
        let lock = StoreLock::new();
        let order = Mutex::new(Vec::new());

        let held = lock.acquire();
        thread::scope(|s| {
            for i in 0..4u64 {
                let (lock, order) = (&lock, &order);
                s.spawn(move || {
                    let _held = lock.acquire();
                    order.lock().unwrap().push(i);
                });
                wait_for_waiters(lock, i + 1);
            }
            drop(held);
        });

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(lock.waiting(), 0);
    }
}
