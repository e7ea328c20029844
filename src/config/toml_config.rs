use crate::config::matching::MatchConfig;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_allowed_values, validate_non_empty_string, validate_path, validate_range,
    validate_unique, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const OUTPUT_FORMATS: [&str; 5] = ["json", "geojson", "csv", "duplicates", "report"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub matching: MatchConfig,
    pub filter: Option<FilterConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

/// 一個輸入來源：檔案內容是陣列，或是帶有 `data` 陣列的物件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: String,
    /// 覆寫記錄上的 source 標籤（預設使用 name）
    pub tag_as: Option<String>,
    /// 檔案不存在時是否視為錯誤（預設只警告並略過）
    pub required: Option<bool>,
}

impl SourceConfig {
    pub fn tag(&self) -> &str {
        self.tag_as.as_deref().unwrap_or(&self.name)
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude) && (self.west..=self.east).contains(&longitude)
    }

    fn validate(&self) -> Result<()> {
        validate_range("filter.bbox.south", self.south, -90.0, 90.0)?;
        validate_range("filter.bbox.north", self.north, -90.0, 90.0)?;
        validate_range("filter.bbox.west", self.west, -180.0, 180.0)?;
        validate_range("filter.bbox.east", self.east, -180.0, 180.0)?;
        if self.south >= self.north || self.west >= self.east {
            return Err(EtlError::ConfigValidationError {
                field: "filter.bbox".to_string(),
                message: "south/west must be smaller than north/east".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub file_prefix: Option<String>,
    pub timestamped: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: Option<String>,
}

impl TomlConfig {
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

    /// 替換環境變數 (例如 ${DATA_DIR})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        if self.sources.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "sources".to_string(),
            });
        }
        for source in &self.sources {
            validate_non_empty_string("sources.name", &source.name)?;
            validate_path("sources.path", &source.path)?;
            if let Some(tag) = &source.tag_as {
                validate_non_empty_string("sources.tag_as", tag)?;
            }
        }
        validate_unique("sources.name", self.sources.iter().map(|s| s.name.as_str()))?;

        validate_path("load.output_path", &self.load.output_path)?;
        if self.load.output_formats.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "load.output_formats".to_string(),
            });
        }
        validate_allowed_values("load.output_formats", &self.load.output_formats, &OUTPUT_FORMATS)?;

        if let Some(bbox) = self.bbox() {
            bbox.validate()?;
        }

        self.matching.validate()
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn file_prefix(&self) -> &str {
        self.load.file_prefix.as_deref().unwrap_or("poi")
    }

    pub fn is_timestamped(&self) -> bool {
        self.load.timestamped.unwrap_or(true)
    }

    pub fn wants_format(&self, format: &str) -> bool {
        self.load.output_formats.iter().any(|f| f == format)
    }

    pub fn bbox(&self) -> Option<&BoundingBox> {
        self.filter.as_ref().and_then(|f| f.bbox.as_ref())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
