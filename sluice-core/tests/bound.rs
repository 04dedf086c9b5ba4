#[cfg(test)]
mod tests {
    use serde_json::json;
    use sluice_core::{DEFAULT_RESULT_BUDGET, Row, RowNames, Truncation, bound_rows};

    fn row(id: i64, payload: &str) -> Row {
        let labels: RowNames = ["id".to_string(), "payload".to_string()].into_iter().collect();
        Row::new(labels, vec![json!(id), json!(payload)].into_boxed_slice())
    }

    #[test]
    fn results_within_budget_pass_through_unchanged() {
        let rows = vec![row(1, "a"), row(2, "b")];
        let (bounded, truncation) = bound_rows(rows.clone(), DEFAULT_RESULT_BUDGET);
        assert_eq!(bounded, rows);
        assert_eq!(truncation, Truncation::none(2));
        assert!(!truncation.is_truncated());
        assert_eq!(truncation.dropped(), 0);
    }

    #[test]
    fn an_empty_result_is_the_identity() {
        let (bounded, truncation) = bound_rows(Vec::new(), 10);
        assert!(bounded.is_empty());
        assert_eq!(truncation, Truncation::none(0));
    }

    #[test]
    fn oversized_results_are_cut_to_a_strict_prefix() {
        let rows = vec![
            row(1, &"a".repeat(40)),
            row(2, &"b".repeat(40)),
            row(3, &"c".repeat(40)),
        ];
        let budget = rows[0].serialized().len() + rows[1].serialized().len();
        let (bounded, truncation) = bound_rows(rows.clone(), budget);
        assert_eq!(bounded.as_slice(), &rows[..2]);
        assert_eq!(truncation, Truncation { original: 3, kept: 2 });
        assert_eq!(truncation.dropped(), 1);
        let used: usize = bounded.iter().map(|r| r.serialized().len()).sum();
        assert!(used <= budget);
    }

    #[test]
    fn a_row_landing_exactly_on_the_budget_is_kept() {
        let rows = vec![row(1, "abc"), row(2, &"y".repeat(200))];
        let budget = rows[0].serialized().len();
        let (bounded, truncation) = bound_rows(rows, budget);
        assert_eq!(bounded.len(), 1);
        assert_eq!(truncation, Truncation { original: 2, kept: 1 });
    }

    #[test]
    fn an_oversized_first_row_yields_an_empty_prefix() {
        let rows = vec![row(1, &"x".repeat(100))];
        let (bounded, truncation) = bound_rows(rows, 10);
        assert!(bounded.is_empty());
        assert_eq!(truncation, Truncation { original: 1, kept: 0 });
        assert_eq!(truncation.dropped(), 1);
    }
}
