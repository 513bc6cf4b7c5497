use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Allowed values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

pub fn validate_unique_names<'a, I>(field_name: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Duplicate name".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("sources.url", "https://example.com/data.csv").is_ok());
        assert!(validate_url("sources.url", "http://example.com").is_ok());
        assert!(validate_url("sources.url", "").is_err());
        assert!(validate_url("sources.url", "invalid-url").is_err());
        assert!(validate_url("sources.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("sources.format", "csv", &["csv", "json"]).is_ok());
        assert!(validate_one_of("sources.format", "xlsx", &["csv", "json"]).is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("sources.name", ["a", "b"]).is_ok());
        let err = validate_unique_names("sources.name", ["a", "b", "a"]).unwrap_err();
        assert!(err.to_string().contains("Duplicate name"));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output.path", "./output").is_ok());
        assert!(validate_path("output.path", "").is_err());
        assert!(validate_path("output.path", "a\0b").is_err());
    }
}
