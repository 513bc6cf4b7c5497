use crate::core::processors::set_type::{builtin_transform, SetType, BUILTIN_TRANSFORMS};
use crate::core::resource_matcher::{ResourceRef, ResourceSelector};
use crate::core::schema_validator::OnError;
use crate::domain::model::SourceFormat;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub flow: FlowInfo,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: Option<String>,
    pub url: Option<String>,
    pub format: Option<SourceFormat>,
    pub delimiter: Option<char>,
    pub headers: Option<std::collections::HashMap<String, String>>,
    pub timeout_seconds: Option<u64>,
}

impl SourceConfig {
    pub fn location(&self) -> &str {
        self.url
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or_default()
    }

    /// 未指定時依副檔名判斷
    pub fn format(&self) -> SourceFormat {
        self.format
            .unwrap_or_else(|| SourceFormat::from_location(self.location()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    SetType(SetTypeStep),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTypeStep {
    pub name: String,
    pub resources: Option<SelectorConfig>,
    pub regex: Option<bool>,
    pub on_error: Option<String>,
    pub transform: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// `resources` 可以是索引、名稱樣式、名稱/索引清單，或 `"*"` 代表所有資源
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorConfig {
    Index(i64),
    Pattern(String),
    List(Vec<SelectorItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorItem {
    Index(i64),
    Name(String),
}

const ALL_RESOURCES: &str = "*";

impl From<&SelectorConfig> for ResourceSelector {
    fn from(config: &SelectorConfig) -> Self {
        match config {
            SelectorConfig::Index(i) => ResourceSelector::index(*i),
            SelectorConfig::Pattern(p) if p == ALL_RESOURCES => ResourceSelector::All,
            SelectorConfig::Pattern(p) => ResourceSelector::pattern(p.clone()),
            SelectorConfig::List(items) => ResourceSelector::Items(
                items
                    .iter()
                    .map(|item| match item {
                        SelectorItem::Index(i) => ResourceRef::Index(*i),
                        SelectorItem::Name(n) => ResourceRef::Name(n.clone()),
                    })
                    .collect(),
            ),
        }
    }
}

impl SetTypeStep {
    pub fn to_processor(&self) -> Result<SetType> {
        let mut step = SetType::new(self.name.clone())
            .regex(self.regex.unwrap_or(true))
            .options(self.options.clone());

        if let Some(selector) = &self.resources {
            step = step.resources(selector.into());
        }

        if let Some(on_error) = &self.on_error {
            let policy = OnError::parse(on_error).ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "steps.on_error".to_string(),
                value: on_error.clone(),
                reason: "Allowed values: raise, ignore, drop, clear".to_string(),
            })?;
            step = step.on_error(policy);
        }

        if let Some(name) = &self.transform {
            let transform = builtin_transform(name).ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "steps.transform".to_string(),
                value: name.clone(),
                reason: format!("Allowed values: {}", BUILTIN_TRANSFORMS.join(", ")),
            })?;
            step = step.transform(transform);
        }

        Ok(step)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub zip: bool,
}

fn default_formats() -> Vec<String> {
    vec!["csv".to_string()]
}

impl FlowConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn output_path(&self) -> &str {
        &self.output.path
    }

    pub fn set_type_steps(&self) -> impl Iterator<Item = &SetTypeStep> {
        self.steps.iter().map(|step| match step {
            StepConfig::SetType(s) => s,
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("flow.name", &self.flow.name)?;

        if self.sources.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "sources".to_string(),
            });
        }
        validation::validate_unique_names(
            "sources.name",
            self.sources.iter().map(|s| s.name.as_str()),
        )?;

        for source in &self.sources {
            validation::validate_non_empty_string("sources.name", &source.name)?;
            match (&source.path, &source.url) {
                (Some(path), None) => validation::validate_path("sources.path", path)?,
                (None, Some(url)) => validation::validate_url("sources.url", url)?,
                _ => {
                    return Err(EtlError::ConfigValidationError {
                        field: format!("sources.{}", source.name),
                        message: "exactly one of `path` or `url` is required".to_string(),
                    })
                }
            }
            if let Some(delimiter) = source.delimiter {
                if !delimiter.is_ascii() {
                    return Err(EtlError::InvalidConfigValueError {
                        field: "sources.delimiter".to_string(),
                        value: delimiter.to_string(),
                        reason: "Delimiter must be a single ASCII character".to_string(),
                    });
                }
            }
        }

        for step in self.set_type_steps() {
            validation::validate_non_empty_string("steps.name", &step.name)?;
            step.to_processor()?;
        }

        validation::validate_path("output.path", &self.output.path)?;
        for format in &self.output.formats {
            validation::validate_one_of("output.formats", format, &["csv", "json"])?;
        }

        Ok(())
    }
}

impl Validate for FlowConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
