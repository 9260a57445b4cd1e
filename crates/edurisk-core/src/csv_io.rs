//! CSV <-> `Table`.
//!
//! Reading follows dataframe conventions: a header row is required, common
//! NA markers become missing, and each column gets one type inferred from
//! its present cells (integer, then float, then boolean, else text). Short
//! rows are padded with missing cells; long rows are rejected.

use crate::error::{PredictError, PredictResult};
use crate::schema::Scalar;
use crate::table::Table;
use csv::{ReaderBuilder, WriterBuilder};

const NA_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];
const TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

#[inline]
fn is_na(field: &str) -> bool {
    NA_MARKERS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    let f = field.trim();
    if TRUE_VALUES.contains(&f) {
        Some(true)
    } else if FALSE_VALUES.contains(&f) {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn infer<'a>(mut fields: impl Iterator<Item = &'a str> + Clone) -> Self {
        if fields.clone().all(|f| f.trim().parse::<i64>().is_ok()) {
            ColumnKind::Int
        } else if fields.clone().all(|f| f.trim().parse::<f64>().is_ok()) {
            ColumnKind::Float
        } else if fields.all(|f| parse_bool(f).is_some()) {
            ColumnKind::Bool
        } else {
            ColumnKind::Text
        }
    }

    fn cell(self, field: String) -> Scalar {
        if is_na(&field) {
            return Scalar::Missing;
        }
        let parsed = match self {
            ColumnKind::Int => field.trim().parse().ok().map(Scalar::Int),
            ColumnKind::Float => field.trim().parse().ok().map(Scalar::Number),
            ColumnKind::Bool => parse_bool(&field).map(Scalar::Bool),
            ColumnKind::Text => return Scalar::Text(field),
        };
        parsed.unwrap_or(Scalar::Missing)
    }
}

/// Parse an uploaded payload. Every failure is `MalformedInput`.
pub fn parse_csv(payload: &[u8]) -> PredictResult<Table> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| PredictError::MalformedInput(format!("payload is not UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| PredictError::MalformedInput(e.to_string()))?
        .clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(PredictError::MalformedInput(
            "No columns to parse from file".to_string(),
        ));
    }
    let ncols = headers.len();

    let mut raw: Vec<Vec<String>> = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PredictError::MalformedInput(format!("row {}: {e}", row_idx + 1))
        })?;
        if record.len() > ncols {
            let line = record.position().map_or(row_idx as u64 + 2, |p| p.line());
            return Err(PredictError::MalformedInput(format!(
                "Expected {ncols} fields in line {line}, saw {}",
                record.len()
            )));
        }
        raw.push(record.iter().map(str::to_string).collect());
    }

    let kinds: Vec<ColumnKind> = (0..ncols)
        .map(|c| {
            ColumnKind::infer(
                raw.iter()
                    .filter_map(move |r| r.get(c).map(String::as_str))
                    .filter(|f| !is_na(f)),
            )
        })
        .collect();

    let mut table = Table::new(headers.iter().map(str::to_string).collect());
    for fields in raw {
        let row = fields
            .into_iter()
            .zip(&kinds)
            .map(|(f, kind)| kind.cell(f))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

/// Serialize with a header row; missing cells are empty.
pub fn write_csv(table: &Table) -> anyhow::Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("flush csv: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}
