//! Environment-sourced service settings

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment};
use image_preprocessing::{TargetSize, ALLOWED_EXTENSIONS};
use inference_engine::{Device, EngineConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::{warn, Level};

/// Number of class labels the classifier head produces
pub const NUM_CLASSES: usize = 4;

const DEFAULT_MODEL_PATH: &str = "models/classifier.onnx";
const DEFAULT_CLASS_NAMES: &str = "cataract,diabetic_retinopathy,glaucoma,normal";
const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Configuration errors detected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("CLASS_NAMES must contain exactly 4 classes, got {0}")]
    ClassCount(usize),

    #[error("CLASS_NAMES contains an empty label")]
    EmptyClassName,

    #[error("CLASS_NAMES contains duplicate label '{0}'")]
    DuplicateClassName(String),

    #[error("IMAGE_SIZE must be in format 'width,height', got '{0}'")]
    ImageSize(String),

    #[error("Unsupported model type: {0}")]
    UnsupportedModelType(String),

    #[error("Unsupported model device: {0}")]
    UnsupportedDevice(String),

    #[error("Invalid log level: {0}")]
    LogLevel(String),

    #[error("Invalid log format '{0}': expected 'text' or 'json'")]
    LogFormat(String),

    #[error("MAX_IMAGE_SIZE must be greater than zero")]
    ZeroMaxImageSize,

    #[error("MAX_REQUEST_SIZE ({request}) must be at least MAX_IMAGE_SIZE ({image})")]
    RequestLimitTooSmall { request: usize, image: usize },
}

/// Serialized model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    #[default]
    Onnx,
}

impl FromStr for ModelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "onnx" => Ok(ModelType::Onnx),
            _ => Err(ConfigError::UnsupportedModelType(s.to_string())),
        }
    }
}

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::LogFormat(s.to_string())),
        }
    }
}

/// Raw values as read from the environment
#[derive(Debug, Deserialize)]
struct RawSettings {
    model_path: String,
    model_type: String,
    image_size: String,
    class_names: String,
    api_host: String,
    api_port: u16,
    log_level: String,
    log_dir: String,
    log_format: String,
    max_image_size: usize,
    max_request_size: Option<usize>,
    model_device: String,
}

/// Validated, read-only service settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the ONNX model artifact
    pub model_path: PathBuf,
    /// Artifact format
    pub model_type: ModelType,
    /// Classifier input size (width, height)
    pub image_size: TargetSize,
    /// Ordered class labels
    pub class_names: Vec<String>,
    pub api_host: String,
    pub api_port: u16,
    pub log_level: Level,
    /// Directory for the rotating log file; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Largest accepted image upload (bytes)
    pub max_image_size: usize,
    /// Largest accepted request body (bytes)
    pub max_request_size: usize,
    /// Accepted upload extensions
    pub allowed_extensions: Vec<String>,
    pub model_device: Device,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_type: ModelType::Onnx,
            image_size: TargetSize::default(),
            class_names: split_class_names(DEFAULT_CLASS_NAMES),
            api_host: "0.0.0.0".to_string(),
            api_port: 5000,
            log_level: Level::INFO,
            log_dir: Some(PathBuf::from("logs")),
            log_format: LogFormat::Text,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            max_request_size: 2 * DEFAULT_MAX_IMAGE_SIZE,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            model_device: Device::Cpu,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Read settings from an explicit set of `KEY=value` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().try_parsing(true).source(Some(map)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .set_default("model_path", DEFAULT_MODEL_PATH)?
            .set_default("model_type", "onnx")?
            .set_default("image_size", "224,224")?
            .set_default("class_names", DEFAULT_CLASS_NAMES)?
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 5000i64)?
            .set_default("log_level", "INFO")?
            .set_default("log_dir", "logs")?
            .set_default("log_format", "text")?
            .set_default("max_image_size", DEFAULT_MAX_IMAGE_SIZE as i64)?
            .set_default("model_device", "cpu")?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let image_size = raw
            .image_size
            .parse::<TargetSize>()
            .map_err(|_| ConfigError::ImageSize(raw.image_size.clone()))?;
        let model_device = raw
            .model_device
            .parse::<Device>()
            .map_err(|_| ConfigError::UnsupportedDevice(raw.model_device.clone()))?;
        let log_level = raw
            .log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::LogLevel(raw.log_level.clone()))?;
        let log_dir = match raw.log_dir.trim() {
            "" => None,
            dir => Some(PathBuf::from(dir)),
        };

        Ok(Self {
            model_path: PathBuf::from(raw.model_path),
            model_type: raw.model_type.parse()?,
            image_size,
            class_names: split_class_names(&raw.class_names),
            api_host: raw.api_host,
            api_port: raw.api_port,
            log_level,
            log_dir,
            log_format: raw.log_format.parse()?,
            max_image_size: raw.max_image_size,
            max_request_size: raw.max_request_size.unwrap_or(raw.max_image_size.saturating_mul(2)),
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            model_device,
        })
    }

    /// Check startup invariants.
    ///
    /// A missing model file only logs a warning; the service still starts and
    /// reports unhealthy until the file appears.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.model_path.exists() {
            warn!("Model file not found at {}", self.model_path.display());
        }
        if self.class_names.len() != NUM_CLASSES {
            return Err(ConfigError::ClassCount(self.class_names.len()));
        }
        if self.class_names.iter().any(|name| name.is_empty()) {
            return Err(ConfigError::EmptyClassName);
        }
        let mut seen = HashSet::with_capacity(self.class_names.len());
        if let Some(dup) = self.class_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ConfigError::DuplicateClassName(dup.clone()));
        }
        if self.max_image_size == 0 {
            return Err(ConfigError::ZeroMaxImageSize);
        }
        if self.max_request_size < self.max_image_size {
            return Err(ConfigError::RequestLimitTooSmall {
                request: self.max_request_size,
                image: self.max_image_size,
            });
        }
        Ok(())
    }

    /// Settings for the model holder
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_path: self.model_path.clone(),
            device: self.model_device,
            class_names: self.class_names.clone(),
            input_size: self.image_size,
        }
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn split_class_names(raw: &str) -> Vec<String> {
    raw.split(',').map(|name| name.trim().to_string()).collect()
}
