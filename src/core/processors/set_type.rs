use crate::core::flow::{DataStream, Processor, RowIter};
use crate::core::resource_matcher::{ResourceMatcher, ResourceSelector};
use crate::core::schema_validator::{schema_validator, OnError};
use crate::domain::model::{FieldType, Package, Row};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// 欄位值轉換函式，依宣告的參數接收 field_name 與 row
#[derive(Clone)]
pub enum Transform {
    Value(Rc<dyn Fn(Value) -> Value>),
    WithField(Rc<dyn Fn(Value, &str) -> Value>),
    WithRow(Rc<dyn Fn(Value, &Row) -> Value>),
    WithFieldAndRow(Rc<dyn Fn(Value, &str, &Row) -> Value>),
}

impl Transform {
    pub fn value<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        Self::Value(Rc::new(f))
    }

    pub fn with_field<F>(f: F) -> Self
    where
        F: Fn(Value, &str) -> Value + 'static,
    {
        Self::WithField(Rc::new(f))
    }

    pub fn with_row<F>(f: F) -> Self
    where
        F: Fn(Value, &Row) -> Value + 'static,
    {
        Self::WithRow(Rc::new(f))
    }

    pub fn with_field_and_row<F>(f: F) -> Self
    where
        F: Fn(Value, &str, &Row) -> Value + 'static,
    {
        Self::WithFieldAndRow(Rc::new(f))
    }

    pub fn apply(&self, value: Value, field_name: &str, row: &Row) -> Value {
        match self {
            Transform::Value(f) => f(value),
            Transform::WithField(f) => f(value, field_name),
            Transform::WithRow(f) => f(value, row),
            Transform::WithFieldAndRow(f) => f(value, field_name, row),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Transform::Value(_) => "Value",
            Transform::WithField(_) => "WithField",
            Transform::WithRow(_) => "WithRow",
            Transform::WithFieldAndRow(_) => "WithFieldAndRow",
        };
        write!(f, "Transform::{}(..)", kind)
    }
}

/// 修改符合名稱的欄位描述，並可選擇轉換欄位值
#[derive(Debug)]
pub struct SetType {
    name: String,
    regex: bool,
    resources: ResourceSelector,
    options: Map<String, Value>,
    on_error: OnError,
    transform: Option<Transform>,
}

impl SetType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regex: true,
            resources: ResourceSelector::default(),
            options: Map::new(),
            on_error: OnError::default(),
            transform: None,
        }
    }

    pub fn resources(mut self, selector: ResourceSelector) -> Self {
        self.resources = selector;
        self
    }

    /// false 時名稱視為一般字串而非正規表達式
    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn field_type(self, field_type: FieldType) -> Self {
        self.option("type", field_type.to_string())
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: Map<String, Value>) -> Self {
        self.options.extend(options);
        self
    }

    fn pattern(&self) -> Result<Regex> {
        let name = if self.regex {
            self.name.clone()
        } else {
            regex::escape(&self.name)
        };
        Ok(Regex::new(&format!("^(?:{})$", name))?)
    }

    /// 更新符合的欄位描述，回傳每個資源被選中的欄位名稱（依 schema 順序）
    pub fn process_package(&self, package: &mut Package) -> Result<Vec<Vec<String>>> {
        let pattern = self.pattern()?;
        let matcher = ResourceMatcher::new(&self.resources, package)?;

        let mut field_names = Vec::with_capacity(package.resources.len());
        for resource in &mut package.resources {
            let mut matched = Vec::new();
            if matcher.matches(&resource.name) {
                for field in &mut resource.schema.fields {
                    if pattern.is_match(&field.name) {
                        field.merge_options(&self.options)?;
                        matched.push(field.name.clone());
                    }
                }
                if !matched.is_empty() {
                    tracing::debug!("🏷️ {}: updated fields {:?}", resource.name, matched);
                }
            }
            field_names.push(matched);
        }

        if field_names.iter().all(Vec::is_empty) {
            return Err(EtlError::FieldNotFound {
                pattern: pattern.as_str().to_string(),
            });
        }

        Ok(field_names)
    }
}

impl Processor for SetType {
    fn name(&self) -> &str {
        "set_type"
    }

    fn process(self: Box<Self>, mut stream: DataStream) -> Result<DataStream> {
        let field_names = self.process_package(&mut stream.package)?;

        let mut resources = Vec::with_capacity(stream.resources.len());
        for ((descriptor, rows), names) in stream
            .package
            .resources
            .iter()
            .zip(stream.resources)
            .zip(field_names)
        {
            if names.is_empty() {
                resources.push(rows);
                continue;
            }

            let rows = match &self.transform {
                Some(transform) => transform_rows(rows, names.clone(), transform.clone()),
                None => rows,
            };
            resources.push(schema_validator(
                &descriptor.name,
                &descriptor.schema,
                rows,
                Some(names.as_slice()),
                self.on_error.clone(),
            )?);
        }

        stream.resources = resources;
        Ok(stream)
    }
}

fn transform_rows(rows: RowIter, field_names: Vec<String>, transform: Transform) -> RowIter {
    Box::new(rows.map(move |row| -> Result<Row> {
        let mut row = row?;
        for name in &field_names {
            let current = row.get(name).cloned().unwrap_or(Value::Null);
            let value = transform.apply(current, name, &row);
            row.insert(name.clone(), value);
        }
        Ok(row)
    }))
}

/// 可在設定檔中以名稱指定的轉換
pub fn builtin_transform(name: &str) -> Option<Transform> {
    let transform = match name {
        "trim" => Transform::value(|v| match v {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        }),
        "lowercase" => Transform::value(|v| match v {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        }),
        "uppercase" => Transform::value(|v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }),
        "null_if_empty" => Transform::value(|v| match v {
            Value::String(s) if s.trim().is_empty() => Value::Null,
            other => other,
        }),
        "strip_non_digits" => Transform::value(|v| match v {
            Value::String(s) => Value::String(s.chars().filter(|c| c.is_ascii_digit()).collect()),
            other => other,
        }),
        _ => return None,
    };
    Some(transform)
}

pub const BUILTIN_TRANSFORMS: &[&str] =
    &["trim", "lowercase", "uppercase", "null_if_empty", "strip_non_digits"];
