use crate::core::flow::{iter_rows, DataStream, Processor, RowIter};
use crate::domain::model::{Field, FieldType, ResourceDescriptor, Row, Schema, SourceData, SourceFormat};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;

enum LoadSource {
    Rows(Vec<Row>),
    Csv { bytes: Vec<u8>, delimiter: u8 },
    Json(Vec<u8>),
}

/// 把一個資源加到資料流尾端
pub struct Load {
    name: String,
    schema: Option<Schema>,
    source: LoadSource,
}

pub fn load_rows(name: impl Into<String>, rows: Vec<Row>) -> Load {
    Load {
        name: name.into(),
        schema: None,
        source: LoadSource::Rows(rows),
    }
}

pub fn load_csv(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Load {
    Load {
        name: name.into(),
        schema: None,
        source: LoadSource::Csv {
            bytes: bytes.into(),
            delimiter: b',',
        },
    }
}

pub fn load_json(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Load {
    Load {
        name: name.into(),
        schema: None,
        source: LoadSource::Json(bytes.into()),
    }
}

pub fn load_source(source: SourceData) -> Load {
    match source.format {
        SourceFormat::Csv => load_csv(source.name, source.bytes),
        SourceFormat::Json => load_json(source.name, source.bytes),
    }
}

impl Load {
    /// 指定 schema，取代自動推斷
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        if let LoadSource::Csv { delimiter: d, .. } = &mut self.source {
            *d = delimiter;
        }
        self
    }
}

impl Processor for Load {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(self: Box<Self>, mut stream: DataStream) -> Result<DataStream> {
        let Load {
            name,
            schema,
            source,
        } = *self;

        let (inferred, rows) = match source {
            LoadSource::Rows(rows) => (infer_schema(&rows), iter_rows(rows)),
            LoadSource::Csv { bytes, delimiter } => csv_rows(bytes, delimiter)?,
            LoadSource::Json(bytes) => {
                let rows = json_rows(&bytes)?;
                (infer_schema(&rows), iter_rows(rows))
            }
        };

        let schema = schema.unwrap_or(inferred);
        tracing::info!(
            "📂 Loaded resource '{}' ({} fields)",
            name,
            schema.fields.len()
        );
        stream.push_resource(ResourceDescriptor::new(name, schema), rows)?;
        Ok(stream)
    }
}

/// 標頭列決定欄位，所有欄位先視為 string，資料列延遲讀取
fn csv_rows(bytes: Vec<u8>, delimiter: u8) -> Result<(Schema, RowIter)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(Cursor::new(bytes));

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let schema = Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h.clone(), FieldType::String))
            .collect(),
    );

    let rows = reader.into_records().map(move |record| -> Result<Row> {
        let record = record?;
        let mut row = Row::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        Ok(row)
    });

    Ok((schema, Box::new(rows)))
}

fn json_rows(bytes: &[u8]) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(EtlError::ProcessingError {
            message: "JSON source must be an array of objects".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(Row::from(map)),
            other => Err(EtlError::ProcessingError {
                message: format!("JSON row {} is not an object: {}", index, other),
            }),
        })
        .collect()
}

fn kind_of(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldType::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
        Value::Number(_) => Some(FieldType::Number),
        Value::String(_) => Some(FieldType::String),
        Value::Array(_) => Some(FieldType::Array),
        Value::Object(_) => Some(FieldType::Object),
    }
}

fn merge_kinds(current: Option<FieldType>, next: Option<FieldType>) -> Option<FieldType> {
    match (current, next) {
        (None, k) | (k, None) => k,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldType::Integer), Some(FieldType::Number))
        | (Some(FieldType::Number), Some(FieldType::Integer)) => Some(FieldType::Number),
        _ => Some(FieldType::Any),
    }
}

/// 由 JSON 值推斷欄位型別，欄位依名稱排序
pub fn infer_schema(rows: &[Row]) -> Schema {
    let mut kinds: BTreeMap<&str, Option<FieldType>> = BTreeMap::new();
    for row in rows {
        for (name, value) in &row.data {
            let entry = kinds.entry(name.as_str()).or_insert(None);
            *entry = merge_kinds(*entry, kind_of(value));
        }
    }

    Schema::new(
        kinds
            .into_iter()
            .map(|(name, kind)| Field::new(name, kind.unwrap_or(FieldType::Any)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::Flow;
    use serde_json::json;

    #[test]
    fn test_load_csv_string_fields() {
        let csv = "id,name\n1,Widget\n2,\n";
        let result = Flow::new().add(load_csv("products", csv)).results().unwrap();

        let descriptor = result.package.resource("products").unwrap();
        assert_eq!(descriptor.schema.field_names(), vec!["id", "name"]);
        assert!(descriptor
            .schema
            .fields
            .iter()
            .all(|f| f.field_type == FieldType::String));

        let rows = result.rows("products").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&json!("1")));
        assert_eq!(rows[1].get("name"), Some(&json!("")));
    }

    #[test]
    fn test_load_csv_with_delimiter() {
        let csv = "a;b\nx;y\n";
        let result = Flow::new()
            .add(load_csv("semi", csv).with_delimiter(b';'))
            .results()
            .unwrap();
        assert_eq!(result.rows("semi").unwrap()[0].get("b"), Some(&json!("y")));
    }

    #[test]
    fn test_load_json_infers_types() {
        let body = json!([
            {"id": 1, "price": 2.5, "tags": ["a"], "flag": true},
            {"id": 2, "price": 3, "tags": [], "flag": null}
        ]);
        let result = Flow::new()
            .add(load_json("items", body.to_string()))
            .results()
            .unwrap();

        let schema = &result.package.resource("items").unwrap().schema;
        assert_eq!(schema.field("id").unwrap().field_type, FieldType::Integer);
        assert_eq!(schema.field("price").unwrap().field_type, FieldType::Number);
        assert_eq!(schema.field("tags").unwrap().field_type, FieldType::Array);
        assert_eq!(schema.field("flag").unwrap().field_type, FieldType::Boolean);
    }

    #[test]
    fn test_load_json_rejects_non_array() {
        let err = Flow::new()
            .add(load_json("bad", r#"{"id": 1}"#))
            .results()
            .unwrap_err();
        assert!(err.to_string().contains("array of objects"));
    }

    #[test]
    fn test_load_rows_with_explicit_schema() {
        let rows = vec![Row::from(json!({"code": "A"}).as_object().cloned().unwrap())];
        let schema = Schema::new(vec![Field::new("code", FieldType::String)]);
        let result = Flow::new()
            .add(load_rows("codes", rows).with_schema(schema.clone()))
            .results()
            .unwrap();
        assert_eq!(result.package.resource("codes").unwrap().schema, schema);
    }
}
