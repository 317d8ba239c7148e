//! JSON / YAML document codec shared by the processors.

use serde_json::Value;

use crate::processors::ProcessorError;

/// Structured formats the processors understand, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next()?;
        match name.rsplit_once('.')?.1 {
            "json" => Some(DocumentFormat::Json),
            "yml" | "yaml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }

    pub fn parse(self, path: &str, content: &str) -> Result<Value, ProcessorError> {
        let parsed = match self {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            DocumentFormat::Yaml if content.trim().is_empty() => Ok(Value::Null),
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ProcessorError::Parse {
            path: path.to_string(),
            message,
        })
    }

    pub fn render(self, path: &str, value: &Value) -> Result<String, ProcessorError> {
        let rendered = match self {
            DocumentFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| ProcessorError::Render {
            path: path.to_string(),
            message,
        })
    }
}
