//! Configuration-loading errors.

/// Struct to represent a TOML parse failure.
#[derive(Debug)]
pub struct ParseErrorStruct {
    /// Path to the file that failed to parse.
    path: String,
    /// The underlying error message.
    msg: String,
}

/// Struct to represent an I/O failure while reading a config or auxiliary file.
#[derive(Debug)]
pub struct IoErrorStruct {
    path: String,
    msg: String,
}

/// Struct to represent a config value that was syntactically valid but semantically wrong.
#[derive(Debug)]
pub struct ValidationErrorStruct {
    field: String,
    msg: String,
}

/// Errors produced while loading and validating the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Parse(ParseErrorStruct),
    Io(IoErrorStruct),
    Validation(ValidationErrorStruct),
}

impl ConfigError {
    pub fn io(path: impl Into<String>, msg: impl Into<String>) -> Self {
        ConfigError::Io(IoErrorStruct {
            path: path.into(),
            msg: msg.into(),
        })
    }

    pub fn parse(path: impl Into<String>, msg: impl Into<String>) -> Self {
        ConfigError::Parse(ParseErrorStruct {
            path: path.into(),
            msg: msg.into(),
        })
    }

    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        ConfigError::Validation(ValidationErrorStruct {
            field: field.into(),
            msg: msg.into(),
        })
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "failed to parse {}: {}", e.path, e.msg),
            ConfigError::Io(e) => write!(f, "failed to read {}: {}", e.path, e.msg),
            ConfigError::Validation(e) => write!(f, "invalid config field {}: {}", e.field, e.msg),
        }
    }
}

impl std::error::Error for ConfigError {}
