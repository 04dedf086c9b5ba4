#[cfg(test)]
mod tests {
    use serde_json::json;
    use sluice_core::{Row, RowNames, truncate_sql};

    fn labels(names: &[&str]) -> RowNames {
        names.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn columns_are_reachable_by_name() {
        let row = Row::new(
            labels(&["id", "name"]),
            vec![json!(7), json!("Ada")].into_boxed_slice(),
        );
        assert_eq!(row.get_column("id"), Some(&json!(7)));
        assert_eq!(row.get_column("name"), Some(&json!("Ada")));
        assert_eq!(row.get_column("missing"), None);
        assert_eq!(row.names().join(","), "id,name");
    }

    #[test]
    fn serialization_preserves_column_order() {
        let row = Row::new(
            labels(&["z", "a"]),
            vec![json!(1), json!("two")].into_boxed_slice(),
        );
        assert_eq!(row.serialized(), r#"{"z":1,"a":"two"}"#);
    }

    #[test]
    fn serialization_escapes_like_json() {
        let row = Row::new(
            labels(&["note"]),
            vec![json!("line\nbreak \"quoted\"")].into_boxed_slice(),
        );
        assert_eq!(row.serialized(), r#"{"note":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn long_statements_are_clipped_for_logs() {
        let short = "SELECT 1";
        assert_eq!(truncate_sql(short), short);
        let long = format!("SELECT * FROM t WHERE c = '{}'", "x".repeat(600));
        let clipped = truncate_sql(&long);
        assert!(clipped.ends_with("..."));
        assert!(clipped.chars().count() <= 500 + 3);
    }
}
