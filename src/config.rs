//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` command-line path
//! 2. `$PECBOX_CONFIG` (environment variable)
//! 3. `~/.config/pecbox/config.toml` (Linux/macOS)
//!    `%APPDATA%\pecbox\config.toml` (Windows)
//!
//! Every section has defaults except the account credentials. They may also
//! come from `PECBOX_SERVER`, `PECBOX_ADDRESS` and `PECBOX_PASSWORD`, which
//! override the file. A missing or incomplete account is an error; nothing
//! is ever filled in with placeholder values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::categorize::{Categorizer, Rule};
use crate::error::{PecError, Result};
use crate::parser::mime::ParseLimits;
use crate::session::DEFAULT_LIMIT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail account credentials.
    pub account: AccountConfig,
    /// What to fetch and how.
    pub fetch: FetchConfig,
    /// MIME traversal limits.
    pub parser: ParseLimits,
    /// Output locations and format.
    pub export: ExportConfig,
    /// Category rules.
    pub categories: CategoriesConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// UI language ("en", "it"). Defaults to the system locale.
    pub lang: Option<String>,
}

/// IMAP account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// IMAP server host name (e.g. `imaps.pec.aruba.it`).
    pub server: String,
    /// IMAP port; 993 is implicit TLS, 143 upgrades with STARTTLS.
    pub port: u16,
    /// Login address.
    pub address: String,
    /// Login password.
    pub password: String,
    /// Accept invalid TLS certificates (testing only).
    pub skip_tls_verify: bool,
}

/// What to fetch and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Folder to read.
    pub folder: String,
    /// Number of most recent messages to process.
    pub limit: usize,
    /// Only process unseen messages.
    pub unread_only: bool,
    /// Mark fetched messages as read on the server.
    pub mark_seen: bool,
    /// Raw messages kept in memory between ingestion and attachment
    /// extraction. 0 re-fetches every message. Peak memory is roughly this
    /// many times the largest message.
    pub cache_messages: usize,
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Format implied by a report file name, if its extension is known.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

/// Output locations and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where attachments are saved.
    pub attachments_dir: PathBuf,
    /// Where timestamped reports are written when no explicit path is given.
    pub report_dir: PathBuf,
    /// Report format.
    pub format: ReportFormat,
}

/// Category rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    /// Drop the built-in rule table and use only `rules`.
    pub replace_defaults: bool,
    /// Extra rules, evaluated in order before the built-in table.
    pub rules: Vec<Rule>,
}

impl CategoriesConfig {
    pub fn categorizer(&self) -> Categorizer {
        if self.replace_defaults {
            Categorizer::with_rules(self.rules.clone())
        } else {
            Categorizer::with_custom_rules(self.rules.clone())
        }
    }
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            lang: None,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 993,
            address: String::new(),
            password: String::new(),
            skip_tls_verify: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            limit: DEFAULT_LIMIT,
            unread_only: false,
            mark_seen: false,
            cache_messages: 0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            attachments_dir: PathBuf::from("allegati_pec"),
            report_dir: PathBuf::from("."),
            format: ReportFormat::Csv,
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

impl AccountConfig {
    /// Fail with an actionable message if anything needed to log in is missing.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("server", self.server.trim().is_empty()),
            ("address", self.address.trim().is_empty()),
            ("password", self.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(PecError::Config(format!(
                "account {} not set (config [account] section or PECBOX_{} environment variables)",
                missing.join(", "),
                missing
                    .iter()
                    .map(|m| m.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(" / PECBOX_")
            )));
        }
        if self.port == 0 {
            return Err(PecError::Config("account port must be non-zero".into()));
        }
        Ok(())
    }

    /// Override fields from `PECBOX_SERVER`, `PECBOX_ADDRESS`, `PECBOX_PASSWORD`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PECBOX_SERVER") {
            self.server = v;
        }
        if let Some(v) = lookup("PECBOX_ADDRESS") {
            self.address = v;
        }
        if let Some(v) = lookup("PECBOX_PASSWORD") {
            self.password = v;
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration.
///
/// An explicit `path` must exist. Otherwise the standard locations are
/// searched and built-in defaults are used when no file is found. A file that
/// exists but does not parse is always an error. The account is not validated
/// here: offline commands do not need one.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => match config_file_path() {
            Some(p) if p.exists() => read_config_file(&p)?,
            _ => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        },
    };
    config
        .account
        .apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| PecError::io(path, e))?;
    let config = toml::from_str::<Config>(&contents)
        .map_err(|e| PecError::Config(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write a commented configuration template. Refuses to overwrite.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(PecError::Config(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PecError::io(parent, e))?;
    }
    std::fs::write(path, TEMPLATE).map_err(|e| PecError::io(path, e))?;
    tracing::info!(path = %path.display(), "Wrote config template");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("PECBOX_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("pecbox").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pecbox")
}

const TEMPLATE: &str = r#"# pecbox configuration

[account]
server = ""            # e.g. "imaps.pec.aruba.it"
port = 993
address = ""           # e.g. "ufficio@pec.example.it"
password = ""          # or leave empty and export PECBOX_PASSWORD
skip_tls_verify = false

[fetch]
folder = "INBOX"
limit = 50
unread_only = false
mark_seen = false
cache_messages = 0     # raw messages kept between ingestion and extraction

[parser]
max_depth = 32
max_parts = 1000

[export]
attachments_dir = "allegati_pec"
report_dir = "."
format = "csv"         # "csv" or "json"

[general]
log_level = "warn"

[categories]
replace_defaults = false

# Extra rules are checked before the built-in ones, first match wins.
# [[categories.rules]]
# category = "Urgent"  # Invoices, Protocol, Urgent, OfficialCertifiedMail, Notifications, General
# field = "subject"    # "subject" or "sender"
# contains = ["sollecito", "diffida"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::Category;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.fetch.folder, "INBOX");
        assert_eq!(cfg.fetch.limit, 50);
        assert_eq!(cfg.account.port, 993);
        assert_eq!(cfg.export.format, ReportFormat::Csv);
        assert_eq!(cfg.parser, ParseLimits::default());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("r.JSON")), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_path(Path::new("out/r.csv")), Some(ReportFormat::Csv));
        assert_eq!(ReportFormat::from_path(Path::new("r.xlsx")), None);
        assert_eq!(ReportFormat::from_path(Path::new("report")), None);
    }

    #[test]
    fn test_template_parses() {
        let cfg: Config = toml::from_str(TEMPLATE).expect("template parses");
        assert_eq!(cfg.fetch.limit, 50);
        assert!(cfg.categories.rules.is_empty());
        assert!(cfg.account.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[account]
server = "imap.example.it"
address = "a@pec.example.it"
password = "pw"

[fetch]
limit = 20
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.fetch.limit, 20);
        assert_eq!(cfg.fetch.folder, "INBOX");
        assert_eq!(cfg.account.port, 993);
        assert!(cfg.account.validate().is_ok());
    }

    #[test]
    fn test_missing_account_fields_are_reported() {
        let account = AccountConfig {
            server: "imap.example.it".into(),
            ..AccountConfig::default()
        };
        let err = account.validate().unwrap_err().to_string();
        assert!(err.contains("address"), "{err}");
        assert!(err.contains("password"), "{err}");
        assert!(!err.contains("server,"), "{err}");
    }

    #[test]
    fn test_env_overrides_account() {
        let mut account = AccountConfig::default();
        account.apply_env(|name| match name {
            "PECBOX_SERVER" => Some("imap.env.it".into()),
            "PECBOX_PASSWORD" => Some("from-env".into()),
            _ => None,
        });
        assert_eq!(account.server, "imap.env.it");
        assert_eq!(account.password, "from-env");
        assert_eq!(account.address, "");
    }

    #[test]
    fn test_debug_redacts_password() {
        let account = AccountConfig {
            password: "hunter2".into(),
            ..AccountConfig::default()
        };
        assert!(!format!("{account:?}").contains("hunter2"));
    }

    #[test]
    fn test_custom_rules_from_toml() {
        let cfg: Config = toml::from_str(
            r#"
[[categories.rules]]
category = "Urgent"
field = "subject"
contains = ["sollecito"]
"#,
        )
        .unwrap();
        let categorizer = cfg.categories.categorizer();
        assert_eq!(
            categorizer.rules().len(),
            crate::categorize::default_rules().len() + 1
        );
        assert_eq!(categorizer.categorize("Sollecito", ""), Category::Urgent);
        assert_eq!(categorizer.categorize("Fattura", ""), Category::Invoices);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[fetch]\nlimit = \"many\"\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(PecError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.toml");
        assert!(matches!(load_config(Some(&path)), Err(PecError::Io { .. })));
    }

    #[test]
    fn test_write_template_refuses_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        write_template(&path).unwrap();
        assert!(path.exists());
        assert!(write_template(&path).is_err());
    }
}
