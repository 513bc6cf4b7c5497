use crate::domain::model::{Package, Row, Schema};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 依 schema 欄位順序輸出 CSV，null 輸出為空字串
pub fn to_csv(schema: &Schema, rows: &[Row]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(schema.fields.iter().map(|f| f.name.as_str()))?;

    for row in rows {
        writer.write_record(schema.fields.iter().map(|f| render_cell(row.get(&f.name))))?;
    }

    let bytes = writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

pub fn to_json(schema: &Schema, rows: &[Row]) -> Result<String> {
    let objects: Vec<serde_json::Map<String, Value>> = rows
        .iter()
        .map(|row| {
            schema
                .fields
                .iter()
                .map(|f| {
                    let value = row.get(&f.name).cloned().unwrap_or(Value::Null);
                    (f.name.clone(), value)
                })
                .collect()
        })
        .collect();
    Ok(serde_json::to_string_pretty(&objects)?)
}

pub fn datapackage_json(package: &Package) -> Result<String> {
    Ok(serde_json::to_string_pretty(package)?)
}

/// 把多個檔案打包成一個 ZIP
pub fn zip_files(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Field, FieldType};
    use serde_json::json;
    use std::io::Read;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", FieldType::Integer),
            Field::new("name", FieldType::String),
            Field::new("tags", FieldType::Array),
        ])
    }

    #[test]
    fn test_to_csv_follows_schema_order() {
        let rows = vec![
            Row::new()
                .with("tags", json!(["a", "b"]))
                .with("name", "Widget, large")
                .with("id", 1),
            Row::new().with("id", 2).with("name", Value::Null),
        ];
        let csv = to_csv(&schema(), &rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,tags");
        assert_eq!(lines[1], r#"1,"Widget, large","[""a"",""b""]""#);
        assert_eq!(lines[2], "2,,");
    }

    #[test]
    fn test_to_json_fills_missing_with_null() {
        let rows = vec![Row::new().with("id", 1)];
        let json_text = to_json(&schema(), &rows).unwrap();
        let parsed: Value = serde_json::from_str(&json_text).unwrap();
        assert_eq!(parsed, json!([{"id": 1, "name": null, "tags": null}]));
    }

    #[test]
    fn test_zip_files_roundtrip_names() {
        let files = vec![
            ("a.csv".to_string(), b"x,y\n".to_vec()),
            ("datapackage.json".to_string(), b"{}".to_vec()),
        ];
        let bytes = zip_files(&files).unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("a.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "x,y\n");
    }
}
