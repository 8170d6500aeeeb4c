use crate::{
    error::SourceError,
    file::{csv::settings::CsvSettings, unique_headers},
};
use model::{
    core::{data_type::TypeInference, value::Value},
    records::{row::Record, table::RecordTable},
};
use std::fs;
use tracing::{debug, warn};

/// Reads a whole delimited file into a record table.
///
/// Rows whose field count differs from the header are skipped with a
/// warning; only a missing file or an unreadable header is fatal.
pub fn read_csv_file(settings: &CsvSettings) -> Result<RecordTable, SourceError> {
    let path = &settings.path;
    if !path.is_file() {
        return Err(SourceError::NotFound(path.display().to_string()));
    }

    let bytes = fs::read(path)?;
    let (text, encoding, had_errors) = settings.encoding.decode(&bytes);
    if had_errors {
        warn!(
            "File {} contains bytes that are not valid {}; they were replaced",
            path.display(),
            encoding.name()
        );
    }

    let body = skip_lines(&text, settings.skip_rows);
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(settings.delimiter)
        .has_headers(settings.has_headers)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut headers = if settings.has_headers {
        let raw = reader
            .headers()
            .map_err(|e| SourceError::Format(format!("{}: {e}", path.display())))?;
        unique_headers(raw.iter())
    } else {
        Vec::new()
    };

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unparseable row {} in {}: {e}", idx + 1, path.display());
                skipped += 1;
                continue;
            }
        };

        if headers.is_empty() && !settings.has_headers {
            headers = (1..=record.len()).map(|i| format!("column_{i}")).collect();
        }

        if record.len() != headers.len() {
            warn!(
                "Skipping row {} in {}: expected {} fields, found {}",
                idx + 1,
                path.display(),
                headers.len(),
                record.len()
            );
            skipped += 1;
            continue;
        }

        raw_rows.push(record.iter().map(String::from).collect());
    }

    if skipped > 0 {
        warn!("Skipped {skipped} malformed rows in {}", path.display());
    }

    let table = to_table(headers, raw_rows, settings.infer_types);
    debug!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

fn to_table(headers: Vec<String>, raw_rows: Vec<Vec<String>>, infer_types: bool) -> RecordTable {
    let types: Vec<_> = if infer_types {
        (0..headers.len())
            .map(|col| {
                let mut inference = TypeInference::default();
                for row in &raw_rows {
                    inference.observe(&row[col]);
                }
                Some(inference.inferred())
            })
            .collect()
    } else {
        vec![None; headers.len()]
    };

    let rows = raw_rows
        .into_iter()
        .map(|cells| {
            let fields = headers.iter().zip(types.iter()).zip(cells).map(|((name, ty), raw)| {
                let value = if raw.trim().is_empty() {
                    Value::Null
                } else {
                    ty.and_then(|ty| ty.parse(&raw, &[]))
                        .unwrap_or(Value::String(raw))
                };
                (name.clone(), value)
            });
            Record::from_pairs(fields)
        })
        .collect();

    RecordTable {
        columns: headers,
        rows,
    }
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_test::traced_test;

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_headers_and_infers_types() {
        let file = write_file(b"date,cat,value\n2025-01-01,A,5\n2025-01-02,B,\n");
        let table = read_csv_file(&CsvSettings::new(file.path())).unwrap();

        assert_eq!(table.columns, vec!["date", "cat", "value"]);
        assert_eq!(table.len(), 2);
        let first = &table.rows[0];
        assert!(matches!(first.get_value("date"), Some(Value::Date(_))));
        assert_eq!(first.get_value("cat"), Some(&Value::String("A".into())));
        assert_eq!(first.get_value("value"), Some(&Value::Int(5)));
        assert_eq!(table.rows[1].get_value("value"), Some(&Value::Null));
    }

    #[test]
    fn test_day_month_order_is_not_guessed() {
        let file = write_file(b"date,value\n01/02/2025,5\n14.03.2025,6\n");
        let table = read_csv_file(&CsvSettings::new(file.path())).unwrap();

        assert_eq!(table.rows[0].get_value("date"), Some(&Value::String("01/02/2025".into())));
        assert_eq!(table.rows[1].get_value("date"), Some(&Value::String("14.03.2025".into())));
        assert_eq!(table.rows[0].get_value("value"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_without_inference_values_stay_text() {
        let file = write_file(b"id\n7\n");
        let mut settings = CsvSettings::new(file.path());
        settings.infer_types = false;

        let table = read_csv_file(&settings).unwrap();
        assert_eq!(table.rows[0].get_value("id"), Some(&Value::String("7".into())));
    }

    #[test]
    #[traced_test]
    fn test_malformed_rows_are_skipped() {
        let file = write_file(b"a,b\n1,2\n3\n4,5\n");
        let table = read_csv_file(&CsvSettings::new(file.path())).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1].get_value("a"), Some(&Value::Int(4)));
        assert!(logs_contain("expected 2 fields, found 1"));
    }

    #[test]
    fn test_skip_rows_and_delimiter() {
        let file = write_file(b"exported by tool\n\nname;qty\nx;1\n");
        let mut settings = CsvSettings::new(file.path());
        settings.skip_rows = 2;
        settings.delimiter = b';';

        let table = read_csv_file(&settings).unwrap();
        assert_eq!(table.columns, vec!["name", "qty"]);
        assert_eq!(table.rows[0].get_value("qty"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_headerless_columns_are_numbered() {
        let file = write_file(b"x,1\ny,2\n");
        let mut settings = CsvSettings::new(file.path());
        settings.has_headers = false;

        let table = read_csv_file(&settings).unwrap();
        assert_eq!(table.columns, vec!["column_1", "column_2"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_decodes_legacy_encoding() {
        let file = write_file(b"name\ncaf\xe9\n");
        let mut settings = CsvSettings::new(file.path());
        settings.encoding = encoding_rs::WINDOWS_1252;

        let table = read_csv_file(&settings).unwrap();
        assert_eq!(table.rows[0].get_value("name"), Some(&Value::String("café".into())));
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let file = write_file(b"a,a,\n1,2,3\n");
        let table = read_csv_file(&CsvSettings::new(file.path())).unwrap();
        assert_eq!(table.columns, vec!["a", "a_2", "column_3"]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_csv_file(&CsvSettings::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
        assert_eq!(err.kind(), "SourceNotFoundError");
    }

    #[test]
    fn test_empty_file_yields_empty_table() {
        let file = write_file(b"");
        let table = read_csv_file(&CsvSettings::new(file.path())).unwrap();
        assert!(table.is_empty());
    }
}
