use serde_json::Value;
use sluice_core::{Row, separated_by};
use std::collections::HashMap;

/// Rows rendered into a table before the "more rows" trailer takes over.
pub const MAX_DISPLAY_ROWS: usize = 50;

const MAX_COLUMN_WIDTH: usize = 50;

/// Render rows as a Markdown-style table, at most [`MAX_DISPLAY_ROWS`] of
/// them, with column widths capped at [`MAX_COLUMN_WIDTH`] characters.
pub fn markdown_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns = first.names();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|row| display_value(row.values().get(i).unwrap_or(&Value::Null)).chars().count())
                .chain([column.chars().count()])
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();
    let mut out = String::new();
    out.push_str("| ");
    separated_by(
        &mut out,
        columns.iter().zip(&widths),
        |out, (column, &width)| out.push_str(&format!("{column:<width$}")),
        " | ",
    );
    out.push_str(" |\n|");
    separated_by(
        &mut out,
        &widths,
        |out, &width| out.push_str(&"-".repeat(width + 2)),
        "|",
    );
    out.push('|');
    for row in rows.iter().take(MAX_DISPLAY_ROWS) {
        out.push_str("\n| ");
        separated_by(
            &mut out,
            row.values().iter().zip(&widths),
            |out, (value, &width)| out.push_str(&format!("{:<width$}", display_value(value))),
            " | ",
        );
        out.push_str(" |");
    }
    if rows.len() > MAX_DISPLAY_ROWS {
        out.push_str(&format!(
            "\n\n... {} more rows ...",
            rows.len() - MAX_DISPLAY_ROWS,
        ));
    }
    out
}

/// Fixed-width report over `DESCRIBE` rows, comments merged in when the
/// metadata lookup produced any.
pub fn describe_report(table: &str, columns: &[Row], comments: &HashMap<String, String>) -> String {
    let mut out = format!("Table `{table}` structure:\n\n");
    out.push_str(&format!(
        "{:<18}{:<18}{:<6}{:<6}{:<18}{:<18}Comment\n",
        "Field", "Type", "Null", "Key", "Default", "Extra",
    ));
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for column in columns {
        let field = cell(column, "Field");
        let comment = comments.get(&field).map(String::as_str).unwrap_or("");
        out.push_str(&format!(
            "{field:<18}{:<18}{:<6}{:<6}{:<18}{:<18}{comment}\n",
            cell(column, "Type"),
            cell(column, "Null"),
            cell(column, "Key"),
            cell(column, "Default"),
            cell(column, "Extra"),
        ));
    }
    out
}

/// One line per index over `SHOW INDEX` rows, first-seen order preserved.
pub fn index_summary(indexes: &[Row]) -> String {
    let mut order = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for index in indexes {
        let key = cell(index, "Key_name");
        grouped
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(cell(index, "Column_name"));
    }
    let mut out = String::from("\nIndexes:\n");
    for key in &order {
        out.push_str(&format!("- {key}: {}\n", grouped[key].join(", ")));
    }
    out
}

/// A value as shown inside a query result table.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

/// A named cell of an introspection row, empty when absent or NULL.
pub(crate) fn cell(row: &Row, name: &str) -> String {
    match row.get_column(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(v)) => v.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;
    use sluice_core::RowNames;

    fn rows(labels: &[&str], values: &[&[Value]]) -> Vec<Row> {
        let labels: RowNames = labels.iter().map(|v| v.to_string()).collect();
        values
            .iter()
            .map(|row| Row::new(labels.clone(), row.to_vec().into_boxed_slice()))
            .collect()
    }

    #[test]
    fn markdown_table_pads_to_the_widest_cell() {
        let rows = rows(
            &["id", "name"],
            &[
                &[json!(1), json!("Beatrix")],
                &[json!(2), json!("Tom")],
                &[json!(3), Value::Null],
            ],
        );
        assert_eq!(
            markdown_table(&rows),
            indoc! {"
                | id | name    |
                |----|---------|
                | 1  | Beatrix |
                | 2  | Tom     |
                | 3  | NULL    |"
            },
        );
    }

    #[test]
    fn markdown_table_caps_displayed_rows() {
        let template = [json!(7)];
        let backing: Vec<&[Value]> = (0..55).map(|_| &template[..]).collect();
        let rows = rows(&["n"], &backing);
        let table = markdown_table(&rows);
        assert_eq!(table.matches('\n').count(), 1 + MAX_DISPLAY_ROWS + 2);
        assert!(table.ends_with("... 5 more rows ..."));
    }

    #[test]
    fn describe_report_merges_comments() {
        let columns = rows(
            &["Field", "Type", "Null", "Key", "Default", "Extra"],
            &[
                &[
                    json!("id"),
                    json!("int(11)"),
                    json!("NO"),
                    json!("PRI"),
                    Value::Null,
                    json!("auto_increment"),
                ],
                &[
                    json!("name"),
                    json!("varchar(64)"),
                    json!("YES"),
                    json!(""),
                    Value::Null,
                    json!(""),
                ],
            ],
        );
        let comments = HashMap::from([("id".to_string(), "primary key".to_string())]);
        let report = describe_report("users", &columns, &comments);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Table `users` structure:");
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[2],
            format!(
                "{:<18}{:<18}{:<6}{:<6}{:<18}{:<18}Comment",
                "Field", "Type", "Null", "Key", "Default", "Extra",
            ),
        );
        assert_eq!(lines[3], "-".repeat(80));
        assert_eq!(
            lines[4],
            format!(
                "{:<18}{:<18}{:<6}{:<6}{:<18}{:<18}{}",
                "id", "int(11)", "NO", "PRI", "", "auto_increment", "primary key",
            ),
        );
        // A column with no comment ends on the empty comment cell.
        assert!(lines[5].starts_with("name"));
        assert!(lines[5].contains("varchar(64)"));
        assert!(lines[5].trim_end().ends_with("YES"));
    }

    #[test]
    fn index_summary_groups_by_key_name() {
        let indexes = rows(
            &["Key_name", "Column_name"],
            &[
                &[json!("PRIMARY"), json!("id")],
                &[json!("by_name"), json!("last_name")],
                &[json!("by_name"), json!("first_name")],
            ],
        );
        assert_eq!(
            index_summary(&indexes),
            "\nIndexes:\n- PRIMARY: id\n- by_name: last_name, first_name\n",
        );
    }
}
