use crate::{
    ConnectionManager, Cursor, WorkerId, execute_with_timeout,
    format::{cell, describe_report, display_value, index_summary, markdown_table},
};
use mysql_async::{Params, params};
use sluice_core::{
    DEFAULT_RESULT_BUDGET, Error, MAX_QUERY_TIMEOUT_SECS, MIN_QUERY_TIMEOUT_SECS,
    QueryTimeoutError, Result, bound_rows, validate_sql, validate_table_name, validate_timeout,
};
use std::{collections::HashMap, sync::Arc, time::Duration};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

const COLUMN_COMMENTS: &str = "SELECT COLUMN_NAME, COLUMN_COMMENT \
    FROM information_schema.COLUMNS \
    WHERE TABLE_NAME = :table AND TABLE_SCHEMA = :schema";

/// Consumer-facing database operations for one worker.
///
/// Every operation returns plain text and never propagates an error past
/// this boundary: failures come back as a descriptive payload starting with
/// a recognizable marker, with situational hints appended where they help.
/// The handle is cheap, the hosting process constructs one per worker around
/// a shared manager.
#[derive(Clone)]
pub struct DatabaseTools {
    manager: Arc<ConnectionManager>,
    worker: WorkerId,
}

impl DatabaseTools {
    pub fn new(manager: Arc<ConnectionManager>, worker: WorkerId) -> Self {
        Self { manager, worker }
    }

    /// List every table of the configured database.
    pub async fn list_tables(&self) -> String {
        match self.try_list_tables().await {
            Ok(text) => text,
            Err(error) => {
                let message = format!("Failed to list tables: {error:#}");
                log::error!("{message}");
                message
            }
        }
    }

    async fn try_list_tables(&self) -> Result<String> {
        self.manager
            .with_cursor(self.worker, async |cursor: &mut Cursor<'_>| {
                let tables = cursor.fetch_all("SHOW TABLES").await?;
                if tables.is_empty() {
                    return Ok("The database contains no tables".to_string());
                }
                let names: Vec<String> = tables
                    .iter()
                    .filter_map(|row| row.values().first())
                    .map(display_value)
                    .collect();
                let mut text = String::new();
                if let Some(note) = &self.manager.config().description {
                    text.push_str(&format!("Database description: {note}\n\n"));
                }
                text.push_str("Tables in the database:\n");
                text.push_str(&names.join("\n"));
                log::info!("retrieved {} tables", names.len());
                Ok(text)
            })
            .await
    }

    /// Report the structure of one table: columns with their comments, plus
    /// an index summary.
    pub async fn describe_table(&self, table: &str) -> String {
        if !validate_table_name(table) {
            return "The table name contains unsupported characters, check it and try again"
                .to_string();
        }
        match self.try_describe_table(table).await {
            Ok(text) => text,
            Err(error) => {
                let message = format!("Failed to describe table `{table}`: {error:#}");
                log::error!("{message}");
                message
            }
        }
    }

    async fn try_describe_table(&self, table: &str) -> Result<String> {
        let database = self.manager.database_name().to_owned();
        self.manager
            .with_cursor(self.worker, async |cursor: &mut Cursor<'_>| {
                let columns = cursor.fetch_all(&format!("DESCRIBE `{table}`")).await?;
                if columns.is_empty() {
                    return Ok(format!("Table `{table}` has no columns"));
                }
                let mut comments = HashMap::new();
                let lookup = cursor
                    .exec_all(
                        COLUMN_COMMENTS,
                        params! { "table" => table, "schema" => database.as_str() },
                    )
                    .await;
                match lookup {
                    Ok(rows) => {
                        for row in &rows {
                            let name = cell(row, "COLUMN_NAME");
                            let comment = cell(row, "COLUMN_COMMENT");
                            if !name.is_empty() && !comment.is_empty() {
                                comments.insert(name, comment);
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("failed to fetch column comments for `{table}`: {e:#}");
                    }
                }
                let mut report = describe_report(table, &columns, &comments);
                match cursor.fetch_all(&format!("SHOW INDEX FROM `{table}`")).await {
                    Ok(indexes) if !indexes.is_empty() => report.push_str(&index_summary(&indexes)),
                    Ok(_) => {}
                    Err(e) => log::warn!("failed to fetch index info for `{table}`: {e:#}"),
                }
                log::info!("retrieved the structure of table `{table}`");
                Ok(report)
            })
            .await
    }

    /// Execute a read-only query under a deadline and render the bounded
    /// result.
    pub async fn run_query(&self, sql: &str, timeout_secs: Option<u64>) -> String {
        if !validate_sql(sql) {
            return "The statement was rejected: only a single read-only query \
                (SELECT, SHOW, DESCRIBE, EXPLAIN) is allowed"
                .to_string();
        }
        let seconds = timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT.as_secs());
        if !validate_timeout(seconds) {
            return format!(
                "The timeout must be between {MIN_QUERY_TIMEOUT_SECS} and \
                {MAX_QUERY_TIMEOUT_SECS} seconds",
            );
        }
        let deadline = Duration::from_secs(seconds);
        let rows = match execute_with_timeout(&self.manager, sql, Params::Empty, deadline).await {
            Ok(rows) => rows,
            Err(error) => {
                if error.downcast_ref::<QueryTimeoutError>().is_none() {
                    // The fault may have poisoned this worker's cached session.
                    self.manager.invalidate(self.worker).await;
                }
                let message = failure_with_hints(sql, &error);
                log::error!("{message}");
                return message;
            }
        };
        if rows.is_empty() {
            return "The query succeeded but returned no rows".to_string();
        }
        let (bounded, truncation) = bound_rows(rows, DEFAULT_RESULT_BUDGET);
        if bounded.is_empty() {
            return format!(
                "The query succeeded but even its first row exceeds the \
                {DEFAULT_RESULT_BUDGET} character output budget, select fewer columns",
            );
        }
        let mut text = format!("Query result ({} rows):\n\n", bounded.len());
        text.push_str(&markdown_table(&bounded));
        if truncation.is_truncated() {
            text.push_str(&format!(
                "\n\nWarning: the result was too large, only the first {} of {} rows are \
                shown.\nNarrow the query or add a LIMIT clause to reduce the returned volume.",
                truncation.kept, truncation.original,
            ));
        }
        log::info!("query returned {} rows", truncation.kept);
        text
    }
}

fn failure_with_hints(sql: &str, error: &Error) -> String {
    let mut message = format!("SQL query failed: {error:#}\n\n{sql}");
    let lowered = format!("{error:#}").to_lowercase();
    if error.downcast_ref::<QueryTimeoutError>().is_some() {
        message.push_str(
            "\n\nHint: the query timed out. Filter with a WHERE clause, add a LIMIT, \
            or raise the timeout (600 seconds at most).",
        );
    } else if lowered.contains("doesn't exist") && lowered.contains("table") {
        message.push_str("\n\nHint: the table does not exist, list the available tables first.");
    } else if lowered.contains("unknown column") {
        message
            .push_str("\n\nHint: the column does not exist, describe the table to see its layout.");
    } else if lowered.contains("parameter") || lowered.contains("placeholder") {
        message.push_str(
            "\n\nHint: a literal `%` or `?` may have been taken for a parameter placeholder, \
            escape it or pass parameters explicitly.",
        );
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn hints_follow_the_failure_kind() {
        let timeout = Error::new(QueryTimeoutError::new(Duration::from_secs(5)));
        assert!(failure_with_hints("SELECT 1", &timeout).contains("timed out"));

        let missing_table = Error::msg("Table 'db.ghosts' doesn't exist");
        assert!(failure_with_hints("SELECT * FROM ghosts", &missing_table)
            .contains("list the available tables"));

        let missing_column = Error::msg("Unknown column 'age' in 'field list'");
        assert!(failure_with_hints("SELECT age FROM users", &missing_column)
            .contains("describe the table"));

        let plain = Error::msg("You have an error in your SQL syntax");
        let message = failure_with_hints("SELEC 1", &plain);
        assert!(message.starts_with("SQL query failed: "));
        assert!(!message.contains("Hint:"));
    }
}
