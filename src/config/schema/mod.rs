use serde::{Deserialize, Serialize};
use tracing::warn;

/// Generate a `Debug` impl that prints every field, masking the ones wrapped in
/// `redact(..)` so secrets never reach the logs.
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Declared after the macro so it can use `redact_debug!`
mod tools;

pub use tools::*;

fn default_true() -> bool {
    true
}

fn default_max_result_chars() -> usize {
    50_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Reject an adapter whose tool names collide instead of overwriting.
    #[serde(default, rename = "rejectDuplicates")]
    pub reject_duplicates: bool,
    #[serde(default = "default_max_result_chars", rename = "maxResultChars")]
    pub max_result_chars: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reject_duplicates: false,
            max_result_chars: default_max_result_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), crate::errors::WebsearchError> {
        self.validate_terminal()?;
        self.validate_web()?;
        self.validate_registry()?;
        Ok(())
    }

    fn validate_terminal(&self) -> Result<(), crate::errors::WebsearchError> {
        use crate::errors::WebsearchError;
        use crate::terminal::{MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS};
        let t = &self.tools.terminal;

        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&t.default_timeout) {
            return Err(WebsearchError::Config(format!(
                "tools.terminal.defaultTimeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds"
            )));
        }
        if t.shell.trim().is_empty() {
            return Err(WebsearchError::Config(
                "tools.terminal.shell must not be empty".into(),
            ));
        }
        if let Some(dir) = &t.working_dir
            && !std::path::Path::new(dir).is_dir()
        {
            warn!("tools.terminal.workingDir {} is not a directory", dir);
        }
        Ok(())
    }

    fn validate_web(&self) -> Result<(), crate::errors::WebsearchError> {
        use crate::errors::WebsearchError;
        let w = &self.tools.web;

        match url::Url::parse(&w.searxng_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => {
                return Err(WebsearchError::Config(format!(
                    "tools.web.searxngUrl is not a valid http(s) URL: {}",
                    w.searxng_url
                )));
            }
        }
        if !(1..=20).contains(&w.max_results) {
            return Err(WebsearchError::Config(
                "tools.web.maxResults must be between 1 and 20".into(),
            ));
        }
        if w.max_content_chars == 0 {
            return Err(WebsearchError::Config(
                "tools.web.maxContentChars must be > 0".into(),
            ));
        }
        if w.timeout_secs == 0 {
            return Err(WebsearchError::Config(
                "tools.web.timeoutSecs must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_registry(&self) -> Result<(), crate::errors::WebsearchError> {
        use crate::errors::WebsearchError;
        if self.registry.max_result_chars < 1_000 {
            return Err(WebsearchError::Config(
                "registry.maxResultChars must be at least 1000".into(),
            ));
        }
        Ok(())
    }
}
