//! Appliance configuration
//!
//! One typed struct per TOML section; every key has a default so a partial
//! file is valid. A handful of keys can be overridden from the environment:
//!
//! | 环境变量 | 覆盖 |
//! |----------|------|
//! | KIOSK_LOG_LEVEL | logging.level |
//! | KIOSK_SERIAL_PORT | scanner.port |
//! | KIOSK_WATCHDOG_PATH | watchdog.path (empty disables) |
//!
//! # 示例
//!
//! ```toml
//! [scanner]
//! port = "/dev/ttyACM0"
//! debounce_ms = 2000
//!
//! [barcode]
//! prefix_regex = '^#\d{1,2}$'
//! body_regex = '^\d{7,9}$'
//!
//! [label]
//! template = "label_template.zpl"
//! titles = { EGL = 1, EGL2 = 2 }
//!
//! [printer.destination]
//! kind = "cups"
//! queue_prefixes = ["Zebra"]
//! ```

use crate::scanning::Symbology;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid regex in {key}: {source}")]
    InvalidRegex {
        key: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub scanner: ScannerConfig,
    pub barcode: BarcodeConfig,
    pub label: LabelConfig,
    pub printer: PrinterConfig,
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// JSON lines instead of human readable output
    pub json: bool,
    /// Daily rotating log files are written here when set
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Serial read timeout, also the control loop tick
    pub timeout_ms: u64,
    /// Bounce window after an admitted scan
    pub debounce_ms: u64,
    /// Lifetime of a pending prefix
    pub reset_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
            debounce_ms: 1500,
            reset_timeout_secs: 60,
        }
    }
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    pub prefix_regex: String,
    pub body_regex: String,
    pub decoders: Vec<DecoderConfig>,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            prefix_regex: r"^#\d{1,2}$".to_string(),
            body_regex: r"^\d{7,9}$".to_string(),
            decoders: vec![DecoderConfig {
                marker: String::new(),
                symbology: Symbology::Code128,
                separator: None,
                default_secondary: None,
            }],
        }
    }
}

/// Body marker → symbology decoding
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecoderConfig {
    /// Literal leading text selecting this decoder; empty matches any body
    #[serde(default)]
    pub marker: String,
    pub symbology: Symbology,
    /// Field separator for two-field codes
    #[serde(default)]
    pub separator: Option<String>,
    /// Secondary value paired with single-field codes
    #[serde(default)]
    pub default_secondary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Relative paths resolve against the config file's directory
    pub template: PathBuf,
    pub titles: TitleCopies,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("label_template.zpl"),
            titles: TitleCopies::from_pairs([("EGL", 1)]),
        }
    }
}

/// One label title and how many copies to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTitle {
    pub title: String,
    pub copies: u32,
}

/// Ordered title → copies mapping, in document order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleCopies(Vec<LabelTitle>);

impl TitleCopies {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(title, copies)| LabelTitle {
                    title: title.into(),
                    copies,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelTitle> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a TitleCopies {
    type Item = &'a LabelTitle;
    type IntoIter = std::slice::Iter<'a, LabelTitle>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for TitleCopies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TitlesVisitor;

        impl<'de> Visitor<'de> for TitlesVisitor {
            type Value = TitleCopies;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of label title = number of copies")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut titles = Vec::new();
                while let Some((title, copies)) = map.next_entry::<String, u32>()? {
                    if copies == 0 {
                        return Err(serde::de::Error::custom(format!(
                            "label title {:?} must print at least one copy",
                            title
                        )));
                    }
                    titles.push(LabelTitle { title, copies });
                }
                Ok(TitleCopies(titles))
            }
        }

        deserializer.deserialize_map(TitlesVisitor)
    }
}

/// Where rendered labels go
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    /// CUPS queue whose name starts with one of the prefixes; the spooler
    /// default when the list is empty
    Cups {
        #[serde(default)]
        queue_prefixes: Vec<String>,
    },
    /// Raw TCP printer, e.g. "192.168.1.50:9100"
    Network { address: String },
    /// Write jobs as files (dry run)
    Directory { path: PathBuf },
}

impl Default for DestinationConfig {
    fn default() -> Self {
        DestinationConfig::Cups {
            queue_prefixes: vec!["Zebra".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub destination: DestinationConfig,
    /// Upper bound for one label submission
    pub submit_timeout_ms: u64,
    /// Let the spooler repeat each label instead of the template's `numCopies`
    pub spooler_copies: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            destination: DestinationConfig::default(),
            submit_timeout_ms: 10_000,
            spooler_copies: false,
        }
    }
}

impl PrinterConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Watchdog device; unset disables the heartbeat
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file and apply environment overrides
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Make relative file paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.label.template.is_relative() {
            self.label.template = base.join(&self.label.template);
        }
        if let DestinationConfig::Directory { path } = &mut self.printer.destination
            && path.is_relative()
        {
            *path = base.join(&*path);
        }
    }

    /// 从环境变量覆盖配置
    pub fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("KIOSK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(port) = std::env::var("KIOSK_SERIAL_PORT") {
            self.scanner.port = port;
        }
        if let Ok(path) = std::env::var("KIOSK_WATCHDOG_PATH") {
            self.watchdog.path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
    }

    /// Checks that do not need any device
    pub fn validate(&self) -> ConfigResult<()> {
        if self.label.titles.is_empty() {
            return Err(ConfigError::Invalid(
                "label.titles must name at least one title".to_string(),
            ));
        }
        if self.scanner.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "scanner.timeout_ms must be positive".to_string(),
            ));
        }
        if self.printer.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "printer.submit_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.scanner.port, "/dev/ttyACM0");
        assert_eq!(config.scanner.debounce(), Duration::from_millis(1500));
        assert_eq!(config.scanner.reset_timeout(), Duration::from_secs(60));
        assert_eq!(config.barcode.body_regex, r"^\d{7,9}$");
        assert_eq!(config.label.titles, TitleCopies::from_pairs([("EGL", 1)]));
        assert_eq!(config.watchdog.path, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_titles_keep_document_order() {
        let config = Config::from_toml_str(
            r#"
            [label]
            titles = { Zeta = 1, Alpha = 2, Mid = 3 }
            "#,
        )
        .unwrap();
        let names: Vec<_> = config.label.titles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_zero_copies_rejected() {
        let err = Config::from_toml_str("[label]\ntitles = { A = 0 }\n").unwrap_err();
        assert!(err.to_string().contains("at least one copy"));
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            [scanner]
            port = "/dev/ttyUSB1"
            debounce_ms = 2000

            [barcode]
            prefix_regex = '^#\d{2}$'
            body_regex = '^[CA].+$'

            [[barcode.decoders]]
            marker = "C"
            symbology = "code128"
            default_secondary = "SERUM"

            [[barcode.decoders]]
            marker = "A"
            symbology = "aztec"
            separator = "|"

            [printer]
            submit_timeout_ms = 3000

            [printer.destination]
            kind = "network"
            address = "10.0.0.5:9100"

            [watchdog]
            path = "/dev/watchdog"
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.port, "/dev/ttyUSB1");
        assert_eq!(config.scanner.baud_rate, 9600);
        assert_eq!(config.barcode.decoders.len(), 2);
        assert_eq!(config.barcode.decoders[1].symbology, Symbology::Aztec);
        assert_eq!(
            config.printer.destination,
            DestinationConfig::Network {
                address: "10.0.0.5:9100".into()
            }
        );
        assert_eq!(config.printer.submit_timeout(), Duration::from_secs(3));
        assert_eq!(config.watchdog.path, Some(PathBuf::from("/dev/watchdog")));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kiosk.toml");
        std::fs::write(
            &path,
            "[label]\ntemplate = \"lbl.zpl\"\n[printer.destination]\nkind = \"directory\"\npath = \"out\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.label.template, tmp.path().join("lbl.zpl"));
        assert_eq!(
            config.printer.destination,
            DestinationConfig::Directory {
                path: tmp.path().join("out")
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/kiosk.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_value_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[scanner]\nbaud_rate = \"fast\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
