use crate::{
    error::SourceError,
    file::unique_headers,
    options::SourceOptions,
    source::{RecordSource, SourceKind, run_blocking},
};
use async_trait::async_trait;
use calamine::{Data, Reader, open_workbook_auto};
use chrono::NaiveTime;
use model::{
    core::{utils::parse_date, utils::parse_timestamp, value::Value},
    execution::errors::ConfigError,
    records::{row::Record, table::RecordTable},
};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which sheet of a workbook to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

#[derive(Debug, Clone)]
pub struct SpreadsheetSettings {
    pub path: PathBuf,
    pub sheet: SheetSelector,
    pub skip_rows: usize,
    pub header_row: usize,
}

impl SpreadsheetSettings {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SpreadsheetSettings {
            path: path.as_ref().to_path_buf(),
            sheet: SheetSelector::default(),
            skip_rows: 0,
            header_row: 0,
        }
    }

    pub fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        Ok(SpreadsheetSettings {
            path: PathBuf::from(opts.required_str("path")?),
            sheet: sheet_selector(opts, "sheet_name")?,
            skip_rows: opts.usize_or("skip_rows", 0)?,
            header_row: opts.usize_or("header_row", 0)?,
        })
    }
}

pub(crate) fn sheet_selector(opts: &SourceOptions, key: &str) -> Result<SheetSelector, ConfigError> {
    match opts.get(key) {
        None => Ok(SheetSelector::default()),
        Some(serde_json::Value::String(name)) => Ok(SheetSelector::Name(name.clone())),
        Some(value) => value
            .as_u64()
            .map(|idx| SheetSelector::Index(idx as usize))
            .ok_or_else(|| opts.invalid(key, "expected a sheet name or a zero-based index")),
    }
}

/// Reads one sheet of a workbook (xlsx, xlsm, xls, ods) into a record table.
pub fn read_spreadsheet(settings: &SpreadsheetSettings) -> Result<RecordTable, SourceError> {
    let path = &settings.path;
    if !path.is_file() {
        return Err(SourceError::NotFound(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| SourceError::Format(format!("{}: {e}", path.display())))?;

    let sheet_names = workbook.sheet_names();
    let sheet = match &settings.sheet {
        SheetSelector::Name(name) => sheet_names.iter().find(|s| *s == name).cloned(),
        SheetSelector::Index(idx) => sheet_names.get(*idx).cloned(),
    }
    .ok_or_else(|| {
        SourceError::Format(format!(
            "sheet {:?} not found in {} (available: {})",
            settings.sheet,
            path.display(),
            sheet_names.join(", ")
        ))
    })?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| SourceError::Format(format!("{}[{sheet}]: {e}", path.display())))?;

    let rows: Vec<&[Data]> = range.rows().skip(settings.skip_rows).collect();
    let table = rows_to_table(&rows, settings.header_row);
    debug!("Read {} rows from {}[{sheet}]", table.len(), path.display());
    Ok(table)
}

fn rows_to_table(rows: &[&[Data]], header_row: usize) -> RecordTable {
    let Some(header) = rows.get(header_row) else {
        return RecordTable::new();
    };
    let headers = unique_headers(header.iter().map(header_text));

    let records = rows[header_row + 1..]
        .iter()
        .map(|cells| {
            Record::from_pairs(headers.iter().enumerate().map(|(idx, name)| {
                let value = cells.get(idx).map(cell_to_value).unwrap_or(Value::Null);
                (name.clone(), value)
            }))
        })
        .collect();

    RecordTable {
        columns: headers,
        rows: records,
    }
}

fn header_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Maps one workbook cell onto a value. Whole floats become integers, dates
/// at midnight become plain dates and error cells become null.
pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(v) => Value::Int(*v),
        Data::Float(v) => whole_float(*v),
        Data::Bool(v) => Value::Boolean(*v),
        Data::String(s) => {
            if s.trim().is_empty() {
                Value::Null
            } else {
                Value::String(s.clone())
            }
        }
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == NaiveTime::MIN => Value::Date(ts.date()),
            Some(ts) => Value::Timestamp(ts),
            None => whole_float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(Value::Timestamp)
            .or_else(|| parse_date(s, &[]).map(Value::Date))
            .unwrap_or_else(|| Value::String(s.clone())),
        Data::DurationIso(s) => Value::String(s.clone()),
    }
}

fn whole_float(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

pub struct SpreadsheetSource {
    id: String,
    settings: SpreadsheetSettings,
}

impl SpreadsheetSource {
    pub fn new(id: &str, settings: SpreadsheetSettings) -> Self {
        SpreadsheetSource {
            id: id.to_string(),
            settings,
        }
    }

    pub fn from_options(id: &str, opts: &SourceOptions) -> Result<Self, ConfigError> {
        Ok(Self::new(id, SpreadsheetSettings::from_options(opts)?))
    }
}

#[async_trait]
impl RecordSource for SpreadsheetSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Excel
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "type": self.kind(),
            "path": self.settings.path.display().to_string(),
            "sheet_name": self.settings.sheet,
            "skip_rows": self.settings.skip_rows,
            "header_row": self.settings.header_row,
        })
    }

    async fn read(&self) -> Result<RecordTable, SourceError> {
        info!("Reading spreadsheet: {}", self.settings.path.display());
        let settings = self.settings.clone();
        run_blocking(move || read_spreadsheet(&settings)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use tempfile::TempDir;

    /// Writes a workbook with a `Notes` sheet first and a `Sales` sheet
    /// second.
    fn write_workbook(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("weekly.xlsx");
        let mut workbook = Workbook::new();

        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "Exported weekly").unwrap();

        let sales = workbook.add_worksheet();
        sales.set_name("Sales").unwrap();
        sales.write_string(0, 0, "cat").unwrap();
        sales.write_string(0, 1, "value").unwrap();
        sales.write_string(1, 0, "A").unwrap();
        sales.write_number(1, 1, 3.0).unwrap();
        sales.write_string(2, 0, "B").unwrap();
        sales.write_number(2, 1, 2.5).unwrap();

        workbook.save(&path).unwrap();
        path
    }

    fn assert_sales(table: &RecordTable) {
        assert_eq!(table.columns, vec!["cat", "value"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].get_value("cat"), Some(&Value::from("A")));
        assert_eq!(table.rows[0].get_value("value"), Some(&Value::Int(3)));
        assert_eq!(table.rows[1].get_value("value"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_sheet_selected_by_name() {
        let dir = TempDir::new().unwrap();
        let mut settings = SpreadsheetSettings::new(write_workbook(&dir));
        settings.sheet = SheetSelector::Name("Sales".into());

        assert_sales(&read_spreadsheet(&settings).unwrap());
    }

    #[test]
    fn test_sheet_selected_by_index() {
        let dir = TempDir::new().unwrap();
        let mut settings = SpreadsheetSettings::new(write_workbook(&dir));
        settings.sheet = SheetSelector::Index(1);
        assert_sales(&read_spreadsheet(&settings).unwrap());

        settings.sheet = SheetSelector::default();
        let notes = read_spreadsheet(&settings).unwrap();
        assert_eq!(notes.columns, vec!["Exported weekly"]);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_absent_sheet_is_format_error() {
        let dir = TempDir::new().unwrap();
        let mut settings = SpreadsheetSettings::new(write_workbook(&dir));

        settings.sheet = SheetSelector::Name("Archive".into());
        let err = read_spreadsheet(&settings).unwrap_err();
        assert_eq!(err.kind(), "SourceFormatError");
        assert!(err.to_string().contains("Notes, Sales"), "{err}");

        settings.sheet = SheetSelector::Index(2);
        assert!(matches!(read_spreadsheet(&settings), Err(SourceError::Format(_))));
    }

    #[tokio::test]
    async fn test_source_reads_configured_sheet() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(&dir);
        let opts = SourceOptions::new(
            "book",
            serde_json::json!({"path": path.display().to_string(), "sheet_name": "Sales"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let source = SpreadsheetSource::from_options("book", &opts).unwrap();

        assert_eq!(source.describe()["sheet_name"], "Sales");
        assert_sales(&source.read().await.unwrap());
    }

    #[test]
    fn test_cell_mapping() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::Error(CellErrorType::Div0)), Value::Null);
        assert_eq!(cell_to_value(&Data::Float(5.0)), Value::Int(5));
        assert_eq!(cell_to_value(&Data::Float(2.5)), Value::Float(2.5));
        assert_eq!(cell_to_value(&Data::Bool(true)), Value::Boolean(true));
        assert_eq!(cell_to_value(&Data::String("  ".into())), Value::Null);
        assert_eq!(
            cell_to_value(&Data::DateTimeIso("2025-01-02".into())),
            Value::Date(chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_rows_to_table_uses_header_row() {
        let title = [Data::String("Weekly export".into())];
        let header = [Data::String("cat".into()), Data::String("value".into())];
        let row = [Data::String("A".into()), Data::Float(3.0)];
        let short = [Data::String("B".into())];
        let rows: Vec<&[Data]> = vec![&title[..], &header[..], &row[..], &short[..]];

        let table = rows_to_table(&rows, 1);

        assert_eq!(table.columns, vec!["cat", "value"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].get_value("value"), Some(&Value::Int(3)));
        assert_eq!(table.rows[1].get_value("value"), Some(&Value::Null));
    }

    #[test]
    fn test_header_row_past_end_is_empty() {
        let rows: Vec<&[Data]> = vec![];
        assert!(rows_to_table(&rows, 0).is_empty());
    }

    #[test]
    fn test_missing_workbook_is_not_found() {
        let settings = SpreadsheetSettings::new("/no/such/book.xlsx");
        assert!(matches!(read_spreadsheet(&settings), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_workbook_is_format_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"this is not a zip archive").unwrap();

        let err = read_spreadsheet(&SpreadsheetSettings::new(file.path())).unwrap_err();
        assert_eq!(err.kind(), "SourceFormatError");
    }

    #[test]
    fn test_sheet_selector_from_options() {
        let opts = SourceOptions::new(
            "book",
            serde_json::json!({"a": "Sales", "b": 2, "c": true})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(sheet_selector(&opts, "a").unwrap(), SheetSelector::Name("Sales".into()));
        assert_eq!(sheet_selector(&opts, "b").unwrap(), SheetSelector::Index(2));
        assert_eq!(sheet_selector(&opts, "missing").unwrap(), SheetSelector::Index(0));
        assert!(sheet_selector(&opts, "c").is_err());
    }
}
