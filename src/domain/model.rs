use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// 一列資料：欄位名稱 -> 值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub data: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_name: &str) -> Option<&Value> {
        self.data.get(field_name)
    }

    pub fn insert(&mut self, field_name: impl Into<String>, value: Value) {
        self.data.insert(field_name.into(), value);
    }

    pub fn with(mut self, field_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field_name, value.into());
        self
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            data: map.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Time,
    Datetime,
    Year,
    Array,
    Object,
    Any,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Year => "year",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    /// 不做檢查但原樣保留的其他限制 (unique、exclusiveMinimum ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

/// `constraints: null` 視為清除所有限制
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 欄位描述：名稱、型別與其他選項
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Constraints::is_empty"
    )]
    pub constraints: Constraints,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            format: None,
            constraints: Constraints::default(),
            options: Map::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// 將選項淺層合併進欄位描述，同名鍵直接覆蓋
    pub fn merge_options(&mut self, options: &Map<String, Value>) -> Result<()> {
        let mut descriptor = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in options {
            descriptor.insert(key.clone(), value.clone());
        }

        let merged = serde_json::from_value(Value::Object(descriptor)).map_err(|e| {
            EtlError::ConfigValidationError {
                field: format!("options for field '{}'", self.name),
                message: e.to_string(),
            }
        })?;
        *self = merged;
        Ok(())
    }
}

fn default_missing_values() -> Vec<String> {
    vec![String::new()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
    #[serde(rename = "missingValues", default = "default_missing_values")]
    pub missing_values: Vec<String>,
    #[serde(rename = "primaryKey", default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            missing_values: default_missing_values(),
            primary_key: Vec::new(),
        }
    }
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub schema: Schema,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            path: None,
            schema,
        }
    }
}

/// datapackage.json 的結構
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

impl Package {
    pub fn resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// 由副檔名推斷格式，無法判斷時視為 CSV
    pub fn from_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        if path.to_ascii_lowercase().ends_with(".json") {
            SourceFormat::Json
        } else {
            SourceFormat::Csv
        }
    }
}

/// extract 階段取得的原始來源內容
#[derive(Debug, Clone)]
pub struct SourceData {
    pub name: String,
    pub format: SourceFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ResourceRows {
    pub name: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub package: Package,
    pub resources: Vec<ResourceRows>,
}

impl TransformResult {
    pub fn rows(&self, resource_name: &str) -> Option<&[Row]> {
        self.resources
            .iter()
            .find(|r| r.name == resource_name)
            .map(|r| r.rows.as_slice())
    }

    pub fn total_rows(&self) -> usize {
        self.resources.iter().map(|r| r.rows.len()).sum()
    }
}
