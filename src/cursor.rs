use crate::RowWrap;
use async_stream::try_stream;
use mysql_async::{Params, Transaction, prelude::Queryable};
use sluice_core::{
    Error, Result, Row, truncate_sql,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::sync::Arc;

/// Transaction-bound handle for exactly one unit of work.
///
/// A cursor only exists inside
/// [`ConnectionManager::with_cursor`](crate::ConnectionManager::with_cursor),
/// which commits it when the scope succeeds and rolls it back when the scope
/// fails. It never outlives the scope that produced it.
pub struct Cursor<'c> {
    transaction: Transaction<'c>,
}

impl<'c> Cursor<'c> {
    pub(crate) fn new(transaction: Transaction<'c>) -> Self {
        Self { transaction }
    }

    /// Stream the rows produced by a raw statement.
    pub fn run<'s>(&'s mut self, sql: &'s str) -> impl Stream<Item = Result<Row>> + Send + 's {
        let context = Arc::new(format!("While running the query:\n{}", truncate_sql(sql)));
        try_stream! {
            log::debug!("executing:\n{}", truncate_sql(sql));
            let mut result = self.transaction.query_iter(sql).await?;
            while let Some(mut stream) = result.stream::<RowWrap>().await? {
                while let Some(row) = stream.next().await.transpose()? {
                    yield row.0
                }
            }
        }
        .map_err(move |e: Error| {
            let e = e.context(context.clone());
            log::error!("{:#}", e);
            e
        })
    }

    /// Run a raw statement and collect every row it returns.
    pub async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.run(sql).try_collect().await
    }

    /// Run a parameterized statement and collect every row it returns.
    pub async fn exec_all(
        &mut self,
        sql: &str,
        params: impl Into<Params> + Send,
    ) -> Result<Vec<Row>> {
        log::debug!("executing:\n{}", truncate_sql(sql));
        Ok(self
            .transaction
            .exec::<RowWrap, _, _>(sql, params)
            .await?
            .into_iter()
            .map(|row| row.0)
            .collect())
    }

    /// Run a parameterized statement and discard its result.
    pub async fn exec_drop(&mut self, sql: &str, params: impl Into<Params> + Send) -> Result<()> {
        log::debug!("executing:\n{}", truncate_sql(sql));
        self.transaction
            .exec_drop(sql, params)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn commit(self) -> Result<()> {
        self.transaction.commit().await.map_err(Into::into)
    }

    pub(crate) async fn rollback(self) -> Result<()> {
        self.transaction.rollback().await.map_err(Into::into)
    }
}
