use crate::{ConnectionManager, RowWrap, close_quietly};
use mysql_async::{Params, prelude::Queryable};
use sluice_core::{Context as _, Error, QueryTimeoutError, Result, Row, truncate_sql};
use std::{sync::Arc, time::Duration};
use tokio::{sync::oneshot, task::JoinHandle, time::timeout};

/// Run a single query under a hard wall-clock deadline.
///
/// The statement executes on a dedicated single-use worker task with its own
/// isolated connection, so two callers can never interleave on one session;
/// the price is one connection setup and teardown per call, an explicit
/// correctness-over-reuse tradeoff for this path only. The worker closes its
/// connection unconditionally, success or failure.
///
/// When the deadline expires the wait is abandoned: the worker is not
/// aborted (the wire protocol cannot be interrupted mid-statement), but the
/// server-side statement is killed best effort through a separate admin
/// connection, and [`QueryTimeoutError`] is returned. A timed out or failed
/// query is never re-issued.
pub async fn execute_with_timeout(
    manager: &Arc<ConnectionManager>,
    sql: &str,
    params: Params,
    deadline: Duration,
) -> Result<Vec<Row>> {
    let (id_tx, mut id_rx) = oneshot::channel();
    let worker = tokio::spawn(query_worker(
        manager.clone(),
        sql.to_owned(),
        params,
        id_tx,
    ));
    bounded_wait(deadline, worker, || {
        if let Ok(id) = id_rx.try_recv() {
            let manager = manager.clone();
            tokio::spawn(async move { kill_in_flight(&manager, id).await });
        }
        log::error!(
            "query exceeded the {} second deadline:\n{}",
            deadline.as_secs(),
            truncate_sql(sql),
        );
    })
    .await
}

/// Block on the worker until it finishes or the deadline elapses, whichever
/// comes first. On expiry the handle is dropped, which detaches rather than
/// aborts the task: its eventual completion has no observable effect.
async fn bounded_wait<T>(
    deadline: Duration,
    worker: JoinHandle<Result<T>>,
    expired: impl FnOnce(),
) -> Result<T> {
    match timeout(deadline, worker).await {
        Ok(joined) => joined.context("the query worker aborted unexpectedly")?,
        Err(_) => {
            expired();
            Err(Error::new(QueryTimeoutError::new(deadline)))
        }
    }
}

async fn query_worker(
    manager: Arc<ConnectionManager>,
    sql: String,
    params: Params,
    id_tx: oneshot::Sender<u32>,
) -> Result<Vec<Row>> {
    let live = manager.connect_raw().await?;
    let mut conn = live.conn;
    // The caller may have stopped waiting already.
    let _ = id_tx.send(conn.id());
    log::debug!("executing on an isolated worker:\n{}", truncate_sql(&sql));
    let result = match params {
        Params::Empty => conn.query::<RowWrap, _>(sql.as_str()).await,
        params => conn.exec::<RowWrap, _, _>(sql.as_str(), params).await,
    };
    // Single-use worker: never leave a session behind, success or failure.
    close_quietly(conn).await;
    Ok(result?.into_iter().map(|row| row.0).collect())
}

/// Best-effort `KILL QUERY` for a statement whose caller stopped waiting.
async fn kill_in_flight(manager: &ConnectionManager, connection_id: u32) {
    match manager.connect_once().await {
        Ok(mut conn) => {
            match conn.query_drop(format!("KILL QUERY {connection_id}")).await {
                Ok(()) => log::info!("killed the in-flight query on connection {connection_id}"),
                Err(e) => log::warn!(
                    "could not kill the in-flight query on connection {connection_id}: {e}"
                ),
            }
            close_quietly(conn).await;
        }
        Err(e) => log::warn!(
            "no admin connection to kill the in-flight query on connection {connection_id}: {e:#}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_a_query_timeout() {
        let worker = tokio::spawn(async { future::pending::<Result<Vec<Row>>>().await });
        let (tx, rx) = std::sync::mpsc::channel();
        let error = bounded_wait(Duration::from_secs(5), worker, move || {
            tx.send(()).expect("the receiver is alive")
        })
        .await
        .unwrap_err();
        let timeout = error
            .downcast_ref::<QueryTimeoutError>()
            .expect("expiry must surface as QueryTimeoutError");
        assert_eq!(timeout.timeout, Duration::from_secs(5));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_worker_beats_the_deadline() {
        let worker = tokio::spawn(async { Ok::<_, Error>(vec![1, 2, 3]) });
        let values = bounded_wait(Duration::from_secs(5), worker, || {
            panic!("the deadline must not expire")
        })
        .await
        .expect("the worker finished in time");
        assert_eq!(values, vec![1, 2, 3]);
    }
}
