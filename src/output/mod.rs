mod json;
mod yaml;

pub use json::JsonFormatter;
pub use yaml::YamlFormatter;

use serde_json::Value;

use crate::cli::OutputFormat;

/// Render a tool result for the terminal
pub fn format(value: &Value, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => JsonFormatter::format(value),
        OutputFormat::Yaml => YamlFormatter::format(value),
    }
}
