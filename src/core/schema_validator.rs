use crate::core::cast::{CastError, FieldCaster};
use crate::core::flow::RowIter;
use crate::domain::model::{Field, Row, Schema};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// 自訂錯誤處理時可取得的資訊
pub struct ErrorContext<'a> {
    pub resource: &'a str,
    pub row_index: usize,
    pub row: &'a Row,
    pub field: &'a Field,
    pub error: &'a CastError,
}

pub type ErrorHandler = Rc<dyn Fn(&ErrorContext<'_>) -> bool>;

/// 資料列轉型失敗時的處理方式
#[derive(Clone, Default)]
pub enum OnError {
    /// 停止並回傳 ValidationError
    #[default]
    Raise,
    /// 保留整列，欄位維持原值
    Ignore,
    /// 丟棄整列
    Drop,
    /// 欄位設為 null 並保留整列
    Clear,
    /// 回傳 true 保留整列，false 丟棄
    Custom(ErrorHandler),
}

impl OnError {
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&ErrorContext<'_>) -> bool + 'static,
    {
        Self::Custom(Rc::new(handler))
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "raise" => Some(Self::Raise),
            "ignore" => Some(Self::Ignore),
            "drop" => Some(Self::Drop),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

impl fmt::Debug for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnError::Raise => f.write_str("Raise"),
            OnError::Ignore => f.write_str("Ignore"),
            OnError::Drop => f.write_str("Drop"),
            OnError::Clear => f.write_str("Clear"),
            OnError::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// 依 schema 轉型並驗證資料列；`field_names` 為 None 時檢查所有欄位
pub fn schema_validator(
    resource: &str,
    schema: &Schema,
    rows: RowIter,
    field_names: Option<&[String]>,
    on_error: OnError,
) -> Result<RowIter> {
    let casters = schema
        .fields
        .iter()
        .filter(|f| field_names.map_or(true, |names| names.contains(&f.name)))
        .map(|f| FieldCaster::new(f, &schema.missing_values))
        .collect::<Result<Vec<_>>>()?;

    Ok(Box::new(ValidatedRows {
        resource: resource.to_string(),
        casters,
        rows,
        index: 0,
        on_error,
        finished: false,
    }))
}

struct ValidatedRows {
    resource: String,
    casters: Vec<FieldCaster>,
    rows: RowIter,
    index: usize,
    on_error: OnError,
    finished: bool,
}

impl ValidatedRows {
    /// 回傳 Ok(true) 表示保留此列
    fn validate_row(&self, row: &mut Row, index: usize) -> Result<bool> {
        let mut keep = true;

        for caster in &self.casters {
            let name = caster.field_name();
            let current = row.get(name).cloned().unwrap_or(Value::Null);

            let error = match caster.cast(&current) {
                Ok(value) => {
                    row.insert(name, value);
                    continue;
                }
                Err(error) => error,
            };

            match &self.on_error {
                OnError::Raise => {
                    return Err(EtlError::ValidationError {
                        resource: self.resource.clone(),
                        row: index,
                        field: name.to_string(),
                        message: error.message,
                    });
                }
                OnError::Ignore => {
                    tracing::debug!(
                        "{}: row {} field '{}' left as is: {}",
                        self.resource,
                        index,
                        name,
                        error
                    );
                }
                OnError::Drop => {
                    tracing::warn!(
                        "⚠️ {}: dropping row {} ({}: {})",
                        self.resource,
                        index,
                        name,
                        error
                    );
                    keep = false;
                }
                OnError::Clear => {
                    tracing::warn!(
                        "⚠️ {}: clearing field '{}' in row {} ({})",
                        self.resource,
                        name,
                        index,
                        error
                    );
                    row.insert(name, Value::Null);
                }
                OnError::Custom(handler) => {
                    let context = ErrorContext {
                        resource: &self.resource,
                        row_index: index,
                        row: &*row,
                        field: caster.field(),
                        error: &error,
                    };
                    if !handler(&context) {
                        keep = false;
                    }
                }
            }
        }

        Ok(keep)
    }
}

impl Iterator for ValidatedRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let mut row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let index = self.index;
            self.index += 1;

            match self.validate_row(&mut row, index) {
                Ok(true) => return Some(Ok(row)),
                Ok(false) => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::iter_rows;
    use crate::domain::model::FieldType;
    use serde_json::json;
    use std::cell::RefCell;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", FieldType::Integer),
            Field::new("price", FieldType::Number),
            Field::new("note", FieldType::String),
        ])
    }

    fn rows() -> RowIter {
        let rows = vec![
            Row::new().with("id", "1").with("price", "9.5").with("note", "ok"),
            Row::new().with("id", "2").with("price", "n/a").with("note", "bad"),
            Row::new().with("id", "3").with("price", "").with("note", "empty"),
        ];
        iter_rows(rows)
    }

    fn run(on_error: OnError, field_names: Option<&[String]>) -> Vec<Result<Row>> {
        schema_validator("items", &schema(), rows(), field_names, on_error)
            .unwrap()
            .collect()
    }

    #[test]
    fn test_raise_stops_at_first_error() {
        let results = run(OnError::Raise, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().get("price"), Some(&json!(9.5)));
        match &results[1] {
            Err(EtlError::ValidationError {
                resource,
                row,
                field,
                ..
            }) => {
                assert_eq!(resource, "items");
                assert_eq!(*row, 1);
                assert_eq!(field, "price");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_removes_row() {
        let rows: Vec<Row> = run(OnError::Drop, None)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(3))]);
        // 缺值轉成 null
        assert_eq!(rows[1].get("price"), Some(&Value::Null));
    }

    #[test]
    fn test_ignore_keeps_original_value() {
        let rows: Vec<Row> = run(OnError::Ignore, None)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("price"), Some(&json!("n/a")));
        assert_eq!(rows[1].get("id"), Some(&json!(2)));
    }

    #[test]
    fn test_clear_sets_null() {
        let rows: Vec<Row> = run(OnError::Clear, None)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("price"), Some(&Value::Null));
    }

    #[test]
    fn test_custom_handler_receives_context() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let handler = OnError::custom(move |ctx| {
            sink.borrow_mut().push((
                ctx.resource.to_string(),
                ctx.row_index,
                ctx.field.name.clone(),
                ctx.row.get("note").cloned(),
            ));
            false
        });

        let rows: Vec<Row> = run(handler, None)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            seen.borrow().as_slice(),
            &[(
                "items".to_string(),
                1,
                "price".to_string(),
                Some(json!("bad"))
            )]
        );
    }

    #[test]
    fn test_field_names_restrict_checks() {
        let only_id = vec!["id".to_string()];
        let rows: Vec<Row> = run(OnError::Raise, Some(&only_id))
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("price"), Some(&json!("n/a")));
        assert_eq!(rows[2].get("id"), Some(&json!(3)));
    }

    #[test]
    fn test_on_error_parse() {
        assert!(matches!(OnError::parse("drop"), Some(OnError::Drop)));
        assert!(OnError::parse("explode").is_none());
    }
}
