use crate::error::SourceError;
use model::{
    core::value::Value,
    records::row::Record,
};
use serde_json::Value as JsonValue;

/// Column used when the record array holds bare scalars.
const SCALAR_COLUMN: &str = "value";

/// Walks a dot path (`data.items`, `results.0.rows`) into a response body.
pub fn resolve_path<'a>(body: &'a JsonValue, path: Option<&str>) -> Result<&'a JsonValue, SourceError> {
    let Some(path) = path else {
        return Ok(body);
    };

    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(body, |node, segment| {
            let next = match node {
                JsonValue::Object(map) => map.get(segment),
                JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            next.ok_or_else(|| {
                SourceError::Format(format!("data_path `{path}` not found at `{segment}`"))
            })
        })
}

/// Maps the node at `path` to records. An array yields one record per
/// element, a single object yields one record.
pub fn extract_records(body: &JsonValue, path: Option<&str>) -> Result<Vec<Record>, SourceError> {
    match resolve_path(body, path)? {
        JsonValue::Array(items) => Ok(items.iter().map(to_record).collect()),
        object @ JsonValue::Object(_) => Ok(vec![to_record(object)]),
        JsonValue::Null => Ok(Vec::new()),
        other => Err(SourceError::Format(format!(
            "expected an array or object of records, found `{other}`"
        ))),
    }
}

fn to_record(item: &JsonValue) -> Record {
    match item {
        JsonValue::Object(map) => Record::from_pairs(
            map.iter()
                .map(|(name, value)| (name.clone(), Value::from_json(value))),
        ),
        scalar => Record::from_pairs([(SCALAR_COLUMN.to_string(), Value::from_json(scalar))]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_nested_array() {
        let body = json!({"data": {"items": [
            {"id": 1, "tags": ["a", "b"], "meta": {"x": 1}},
            {"id": 2, "tags": null}
        ]}});

        let records = extract_records(&body, Some("data.items")).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_value("id"), Some(&Value::Int(1)));
        assert_eq!(records[0].get_value("tags"), Some(&Value::from(r#"["a","b"]"#)));
        assert_eq!(records[0].get_value("meta"), Some(&Value::from(r#"{"x":1}"#)));
        assert_eq!(records[1].get_value("tags"), Some(&Value::Null));
    }

    #[test]
    fn test_single_object_is_one_row() {
        let body = json!({"result": {"total": 10}});
        let records = extract_records(&body, Some("result")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_array_index_segments() {
        let body = json!({"pages": [{"rows": [1, 2]}]});
        let records = extract_records(&body, Some("pages.0.rows")).unwrap();
        assert_eq!(records[1].get_value("value"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_missing_path_is_format_error() {
        let body = json!({"data": []});
        let err = extract_records(&body, Some("items")).unwrap_err();
        assert_eq!(err.kind(), "SourceFormatError");

        let err = extract_records(&json!("text"), None).unwrap_err();
        assert_eq!(err.kind(), "SourceFormatError");
    }
}
