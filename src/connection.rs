use crate::Cursor;
use mysql_async::{Conn, Opts, OptsBuilder, TxOpts, prelude::Queryable};
use sluice_core::{
    ConnectionConfig, ConnectionError, Context as _, CursorError, Error, Result,
};
use std::time::{Duration, Instant};
use tokio::{
    sync::{Mutex, MutexGuard},
    time::{sleep, timeout},
};

/// Connections older than this are retired even when they still look healthy.
pub const MAX_CONNECTION_AGE: Duration = Duration::from_secs(3600);

const CONNECT_RETRIES: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);
const CONNECT_DEADLINE: Duration = Duration::from_secs(10);
const CURSOR_ATTEMPTS: u32 = 2;
const CURSOR_PAUSE: Duration = Duration::from_secs(1);

/// Identity of a calling worker. Each id maps to one connection slot, so two
/// workers never touch the same live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

pub(crate) struct LiveConnection {
    pub(crate) conn: Conn,
    created: Instant,
}

impl LiveConnection {
    pub(crate) fn established(conn: Conn) -> Self {
        Self {
            conn,
            created: Instant::now(),
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.created.elapsed() <= max_age
    }
}

type Slot = Option<LiveConnection>;

/// Hands out one valid, fresh-enough connection per worker, transparently
/// replacing stale or broken ones.
///
/// Construct it once and pass it by [`std::sync::Arc`] to whatever issues
/// queries; shutdown goes through [`ConnectionManager::close`]. Slots are
/// per worker, so steady-state reuse never contends across workers; only
/// the create-or-replace transition takes the shared creation lock.
pub struct ConnectionManager {
    config: ConnectionConfig,
    slots: Box<[Mutex<Slot>]>,
    create_lock: Mutex<()>,
    max_connection_age: Duration,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, workers: usize) -> Self {
        let slots = (0..workers.max(1)).map(|_| Mutex::new(None)).collect();
        Self {
            config,
            slots,
            create_lock: Mutex::new(()),
            max_connection_age: MAX_CONNECTION_AGE,
        }
    }

    /// Lower the staleness threshold, mostly useful to exercise replacement.
    pub fn with_max_connection_age(mut self, max_age: Duration) -> Self {
        self.max_connection_age = max_age;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    fn slot(&self, worker: WorkerId) -> &Mutex<Slot> {
        &self.slots[worker.0 % self.slots.len()]
    }

    /// Hand out the worker's connection, reusing the cached handle while it
    /// is fresh enough and creating a replacement otherwise.
    pub async fn get_connection(&self, worker: WorkerId) -> Result<ConnectionGuard<'_>> {
        Ok(ConnectionGuard {
            slot: self.acquire(worker).await?,
        })
    }

    async fn acquire(&self, worker: WorkerId) -> Result<MutexGuard<'_, Slot>> {
        let mut slot = self.slot(worker).lock().await;
        if slot
            .as_ref()
            .is_some_and(|live| live.is_fresh(self.max_connection_age))
        {
            return Ok(slot);
        }
        let _create = self.create_lock.lock().await;
        if let Some(stale) = slot.take() {
            close_quietly(stale.conn).await;
        }
        *slot = Some(self.connect_raw().await?);
        Ok(slot)
    }

    /// One dial with a hard deadline, charset applied via an init statement.
    pub(crate) async fn connect_once(&self) -> Result<Conn> {
        let context = || {
            format!(
                "While trying to connect to `{}@{}:{}/{}`",
                self.config.user, self.config.host, self.config.port, self.config.database,
            )
        };
        let url = self.config.url()?;
        let opts = Opts::from_url(url.as_str()).with_context(context)?;
        let opts: Opts = OptsBuilder::from_opts(opts)
            .init(vec![format!("SET NAMES {}", self.config.charset)])
            .into();
        match timeout(CONNECT_DEADLINE, Conn::new(opts)).await {
            Ok(outcome) => outcome.with_context(context),
            Err(_) => Err(Error::msg(format!(
                "no connection after {} seconds",
                CONNECT_DEADLINE.as_secs(),
            ))
            .context(context())),
        }
    }

    /// Creation with retry: the initial attempt plus up to three more,
    /// backing off 1s, 2s, 4s. The final failure is wrapped in
    /// [`ConnectionError`] and propagated, never swallowed.
    pub(crate) async fn connect_raw(&self) -> Result<LiveConnection> {
        let mut attempt = 1;
        loop {
            match self.connect_once().await {
                Ok(conn) => {
                    log::info!("MySQL connection established (attempt {attempt})");
                    return Ok(LiveConnection::established(conn));
                }
                Err(error) if attempt <= CONNECT_RETRIES => {
                    log::warn!("connection attempt {attempt} failed: {error:#}");
                    sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(error) => {
                    let error = error.context(ConnectionError { attempts: attempt });
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
    }

    /// Close and forget the worker's cached connection, best effort. The
    /// next acquisition from that worker establishes a fresh session.
    pub async fn invalidate(&self, worker: WorkerId) {
        if let Some(live) = self.slot(worker).lock().await.take() {
            close_quietly(live.conn).await;
        }
    }

    /// Non-throwing health probe: true only when a cached, fresh connection
    /// answers a trivial query.
    pub async fn test_connection(&self, worker: WorkerId) -> bool {
        let mut slot = self.slot(worker).lock().await;
        match slot.as_mut() {
            Some(live) if live.is_fresh(self.max_connection_age) => {
                live.conn.query_first::<u8, _>("SELECT 1").await.is_ok()
            }
            _ => false,
        }
    }

    /// Scoped cursor acquisition.
    ///
    /// Obtaining a connection and opening a cursor on it is attempted up to
    /// two times, invalidating the failed connection and pausing in between.
    /// The scope itself runs at most once: commit when it returns `Ok`,
    /// best-effort rollback when it returns `Err` plus invalidation when the
    /// failure looks like a broken session, and the original error is always
    /// re-raised. The statements issued inside the scope are never retried.
    pub async fn with_cursor<T, F>(&self, worker: WorkerId, scope: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Cursor<'_>) -> Result<T>,
    {
        let mut scope = Some(scope);
        let mut last: Option<Error> = None;
        for attempt in 1..=CURSOR_ATTEMPTS {
            let mut slot = match self.acquire(worker).await {
                Ok(slot) => slot,
                Err(error) => {
                    log::warn!("failed to acquire a cursor (attempt {attempt}): {error:#}");
                    last = Some(error);
                    if attempt < CURSOR_ATTEMPTS {
                        sleep(CURSOR_PAUSE).await;
                    }
                    continue;
                }
            };
            let live = slot
                .as_mut()
                .expect("the slot holds a connection while guarded");
            let started = live.conn.start_transaction(TxOpts::default()).await;
            if started.is_err() {
                let error = started.unwrap_err();
                log::warn!("failed to acquire a cursor (attempt {attempt}): {error:#}");
                last = Some(error.into());
                if let Some(bad) = slot.take() {
                    close_quietly(bad.conn).await;
                }
                if attempt < CURSOR_ATTEMPTS {
                    sleep(CURSOR_PAUSE).await;
                }
                continue;
            }
            let transaction = started.unwrap();
            let Some(scope) = scope.take() else {
                break;
            };
            let mut cursor = Cursor::new(transaction);
            return match scope(&mut cursor).await {
                Ok(value) => match cursor.commit().await {
                    Ok(()) => Ok(value),
                    Err(error) => Err(discard_on_fault(&mut slot, error).await),
                },
                Err(error) => {
                    if let Err(e) = cursor.rollback().await {
                        log::warn!("rollback failed: {e:#}");
                    }
                    Err(discard_on_fault(&mut slot, error).await)
                }
            };
        }
        Err(last
            .unwrap_or_else(|| Error::msg("unable to acquire a MySQL cursor"))
            .context(CursorError {
                attempts: CURSOR_ATTEMPTS,
            }))
    }

    /// Shutdown hook: best-effort close of every slot.
    pub async fn close(&self) {
        for slot in &self.slots {
            if let Some(live) = slot.lock().await.take() {
                close_quietly(live.conn).await;
            }
        }
        log::info!("MySQL connections closed");
    }
}

/// Exclusive access to one worker's live connection. Holding the guard keeps
/// the worker's slot locked, which is what makes cross-worker sharing of a
/// session impossible.
pub struct ConnectionGuard<'m> {
    slot: MutexGuard<'m, Slot>,
}

impl ConnectionGuard<'_> {
    pub fn conn(&mut self) -> &mut Conn {
        &mut self
            .slot
            .as_mut()
            .expect("the slot holds a connection while guarded")
            .conn
    }
}

/// Invalidate the slot when the error smells like a connection-level fault,
/// so the next caller does not inherit a broken session.
async fn discard_on_fault(slot: &mut MutexGuard<'_, Slot>, error: Error) -> Error {
    if is_connection_fault(&error) {
        log::warn!("connection fault detected, invalidating: {error:#}");
        if let Some(live) = slot.take() {
            close_quietly(live.conn).await;
        }
    }
    error
}

/// Ignore-and-log close: a connection being discarded has nobody meaningful
/// to report failures to.
pub(crate) async fn close_quietly(conn: Conn) {
    if let Err(e) = conn.disconnect().await {
        log::warn!("error while closing a MySQL connection: {e}");
    }
}

/// Whether the error chain points at a broken session rather than at a bad
/// statement.
pub fn is_connection_fault(error: &Error) -> bool {
    error.chain().any(|cause| {
        match cause.downcast_ref::<mysql_async::Error>() {
            Some(mysql_async::Error::Io(_)) | Some(mysql_async::Error::Driver(_)) => true,
            Some(_) => false,
            None => {
                let text = cause.to_string().to_lowercase();
                text.contains("connection") || text.contains("packet sequence")
            }
        }
    })
}

fn backoff_delay(attempt: u32) -> Duration {
    CONNECT_BACKOFF * 2u32.saturating_pow(attempt - 1)
}
