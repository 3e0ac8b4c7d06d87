// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Name attached to every record
    #[serde(default = "default_application")]
    pub application: String,
    /// Write to this file instead of stdout
    #[serde(default)]
    pub file: Option<String>,
    /// Filter directive, e.g. `info` or `quill_server=debug,sqlx=warn`.
    /// `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
    /// Include source file and line
    #[serde(default)]
    pub add_source: bool,
    #[serde(default = "default_redaction")]
    pub redaction_enabled: bool,
}

fn default_application() -> String {
    "quill".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    true
}

fn default_redaction() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            application: default_application(),
            file: None,
            level: default_level(),
            json: default_json(),
            add_source: false,
            redaction_enabled: default_redaction(),
        }
    }
}
