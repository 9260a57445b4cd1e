use crate::schema::Scalar;
use serde_json::{Map, Value};

/// Row-major table with ordered, possibly duplicated column names.
///
/// Every row has exactly one cell per column. Lookups by name resolve to the
/// first matching column, the same way a dataframe selects by label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// One-row table from a JSON object, keeping key order.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let columns = record.keys().cloned().collect();
        let row = record.values().map(Scalar::from_json).collect();
        Self {
            columns,
            rows: vec![row],
        }
    }

    /// Append a row. Short rows are padded with missing cells, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Scalar>) {
        row.resize(self.columns.len(), Scalar::Missing);
        self.rows.push(row);
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Scalar> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Scalar> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Assign a column: overwrite in place if it exists, otherwise append.
    ///
    /// `values` must hold one cell per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Scalar>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Rename columns in place; each name is looked up independently.
    pub fn rename_with<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        for c in self.columns.iter_mut() {
            if let Some(new) = f(c) {
                *c = new;
            }
        }
    }

    /// Copy without every column called `name`.
    pub fn without_column(&self, name: &str) -> Self {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| self.columns[i] != name)
            .collect();
        Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| keep.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        }
    }

    /// Apply `f` to every cell.
    pub fn map_cells<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Scalar),
    {
        for row in self.rows.iter_mut() {
            for cell in row.iter_mut() {
                f(cell);
            }
        }
    }

    /// Single row as a standalone one-row table.
    pub fn row_table(&self, row: usize) -> Option<Self> {
        let r = self.rows.get(row)?;
        Some(Self {
            columns: self.columns.clone(),
            rows: vec![r.clone()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc() -> Table {
        let mut t = Table::new(vec!["a".into(), "b".into(), "c".into()]);
        t.push_row(vec![Scalar::Number(1.0), Scalar::Text("x".into()), Scalar::Missing]);
        t.push_row(vec![Scalar::Number(2.0), Scalar::Text("y".into()), Scalar::Number(0.5)]);
        t
    }

    #[test]
    fn from_record_keeps_key_order() {
        let obj = json!({"z": 1, "a": "s", "m": null});
        let t = Table::from_record(obj.as_object().unwrap());
        assert_eq!(t.columns(), ["z", "a", "m"]);
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.cell(0, "m"), Some(&Scalar::Missing));
    }

    #[test]
    fn set_column_overwrites_in_place() {
        let mut t = abc();
        t.set_column("b", vec![Scalar::Number(9.0), Scalar::Number(8.0)]);
        assert_eq!(t.columns(), ["a", "b", "c"]);
        assert_eq!(t.cell(1, "b"), Some(&Scalar::Number(8.0)));

        t.set_column("d", vec![Scalar::Missing, Scalar::Missing]);
        assert_eq!(t.columns(), ["a", "b", "c", "d"]);
        assert!(t.rows().iter().all(|r| r.len() == 4));
    }

    #[test]
    fn without_column_keeps_rest_in_order() {
        let t = abc().without_column("b");
        assert_eq!(t.columns(), ["a", "c"]);
        assert_eq!(t.rows()[1], vec![Scalar::Number(2.0), Scalar::Number(0.5)]);
    }

    #[test]
    fn push_row_pads_short_rows() {
        let mut t = Table::new(vec!["a".into(), "b".into()]);
        t.push_row(vec![Scalar::Number(1.0)]);
        assert_eq!(t.rows()[0], vec![Scalar::Number(1.0), Scalar::Missing]);
    }
}
