use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from stress-report.toml.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ReportConfig {
    pub input: InputConfig,
    pub extract: ExtractConfig,
    pub compare: CompareConfig,
    pub output: OutputConfig,
}

/// Where the harness logs live and how they are named.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub first: u32,
    pub last: u32,
    /// List `{prefix}<N>.{extension}` in `dir` instead of using `first..=last`.
    pub discover: bool,
    /// Explicit files; when non-empty these replace every other source.
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    pub marker: String,
    /// Stop reading a file at its first empty fragment.
    pub stop_at_empty: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompareConfig {
    pub method: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub delimiter: char,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Table,
}

// --- Default implementations ---

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "stress".to_string(),
            extension: "log".to_string(),
            first: 1,
            last: 10,
            discover: false,
            files: Vec::new(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            marker: "State:{".to_string(),
            stop_at_empty: true,
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            method: "put".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            delimiter: ',',
        }
    }
}

impl ReportConfig {
    /// Parse a config from TOML text and validate it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: ReportConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extract.marker.is_empty() {
            return Err(ConfigError::Invalid("extract.marker must not be empty".into()));
        }
        if !self.output.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "output.delimiter must be a single ASCII character, got {:?}",
                self.output.delimiter
            )));
        }
        if self.input.prefix.is_empty() && self.input.files.is_empty() {
            return Err(ConfigError::Invalid("input.prefix must not be empty".into()));
        }
        Ok(())
    }

    /// The delimiter as the single byte the csv writer expects.
    pub fn delimiter_byte(&self) -> u8 {
        let mut buf = [0u8; 4];
        self.output.delimiter.encode_utf8(&mut buf);
        buf[0]
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ReportConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => ReportConfig::from_toml(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(ReportConfig::default())
        }
        Err(e) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}
