use crate::table::Table;
use std::collections::HashMap;

/// Rename raw upload columns to the training-time names.
///
/// Best-effort: names missing from `rename` pass through, nothing is dropped.
pub fn clean_column_names(table: &Table, rename: &HashMap<String, String>) -> Table {
    let mut out = table.clone();
    out.rename_with(|c| rename.get(c).cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scalar;

    fn raw() -> Table {
        let mut t = Table::new(vec![
            "Curricular units 1st sem (enrolled)".into(),
            "Curricular units 1st sem (approved)".into(),
            "student_id".into(),
        ]);
        t.push_row(vec![Scalar::Number(6.0), Scalar::Number(5.0), Scalar::Text("s1".into())]);
        t
    }

    fn rename_map() -> HashMap<String, String> {
        HashMap::from([
            ("Curricular units 1st sem (enrolled)".to_string(), "sem1_enrolled".to_string()),
            ("Curricular units 1st sem (approved)".to_string(), "sem1_approved".to_string()),
            ("Not in upload".to_string(), "ghost".to_string()),
        ])
    }

    #[test]
    fn renames_known_and_keeps_unknown() {
        let input = raw();
        let out = clean_column_names(&input, &rename_map());
        assert_eq!(out.columns(), ["sem1_enrolled", "sem1_approved", "student_id"]);
        assert_eq!(out.rows(), input.rows());
        // input untouched
        assert_eq!(input.columns()[0], "Curricular units 1st sem (enrolled)");
    }

    #[test]
    fn never_drops_columns() {
        let input = raw();
        let out = clean_column_names(&input, &HashMap::new());
        assert_eq!(out, input);

        let collide = HashMap::from([
            ("Curricular units 1st sem (enrolled)".to_string(), "x".to_string()),
            ("Curricular units 1st sem (approved)".to_string(), "x".to_string()),
        ]);
        let out = clean_column_names(&input, &collide);
        assert_eq!(out.n_cols(), input.n_cols());
    }
}
