use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use amo_logging::amo_debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

pub const RC_FILENAME: &str = ".amorc";
pub const HOST_ENV: &str = "AMO_HOST";

pub const DEFAULT_PUBLIC_BASE: &str = "https://addons.mozilla.org";
pub const DEFAULT_INTERNAL_BASE: &str = "https://addons-internal.prod.mozaws.net";
pub const DEFAULT_LOCALE: &str = "en-US";
pub const DEFAULT_IDENTITY_HOST: &str = "accounts.firefox.com";
pub const DEFAULT_REDASH_BASE: &str = "https://sql.telemetry.mozilla.org";
/// Redash data source backed by the AMO database replica.
pub const DEFAULT_REDASH_DATA_SOURCE: u64 = 25;
pub const DEFAULT_BUGZILLA_BASE: &str = "https://bugzilla.mozilla.org";

/// Credentials for the console session.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the console's `sessionid` cookie.
    pub session_id: Option<String>,
    /// JSON file of `{ "cookie name": "value" }` exported from a browser.
    pub cookie_file: Option<PathBuf>,
}

/// Redash instance used for reporting queries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedashConfig {
    pub base_url: String,
    #[serde(alias = "apikey")]
    pub api_key: Option<String>,
    pub data_source_id: u64,
    /// How long to wait for a queued query before giving up.
    pub poll_timeout_secs: u64,
    pub poll_interval_millis: u64,
}

impl Default for RedashConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REDASH_BASE.to_string(),
            api_key: None,
            data_source_id: DEFAULT_REDASH_DATA_SOURCE,
            poll_timeout_secs: 60,
            poll_interval_millis: 1000,
        }
    }
}

impl RedashConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

/// Bugzilla REST access.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BugzillaConfig {
    pub base_url: String,
    #[serde(alias = "apikey")]
    pub api_key: Option<String>,
    /// Reads go through, writes are logged and skipped.
    pub readonly: bool,
}

impl Default for BugzillaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BUGZILLA_BASE.to_string(),
            api_key: None,
            readonly: false,
        }
    }
}

/// Explicit configuration handed to the session and the console pages.
///
/// Read from `~/.amorc` (JSON). Keys the tool does not know are ignored so the
/// file can be shared with other moderation scripts.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub public_base: String,
    /// The admin console is only served from the internal host.
    pub internal_base: String,
    pub locale: String,
    pub identity_host: String,
    pub auth: AuthConfig,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_body_bytes: u64,
    pub dry_run: bool,
    pub redash: RedashConfig,
    pub bugzilla: BugzillaConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            public_base: DEFAULT_PUBLIC_BASE.to_string(),
            internal_base: DEFAULT_INTERNAL_BASE.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            identity_host: DEFAULT_IDENTITY_HOST.to_string(),
            auth: AuthConfig::default(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            redirect_limit: 5,
            max_body_bytes: 16 * 1024 * 1024,
            dry_run: false,
            redash: RedashConfig::default(),
            bugzilla: BugzillaConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Config pointing both hosts at one base URL, e.g. a local test server.
    pub fn for_base_url(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            public_base: base.clone(),
            internal_base: base,
            ..Self::default()
        }
    }

    /// `AMO_HOST` replaces both the public and the internal host.
    pub fn with_host_override(mut self, host: Option<&str>) -> Self {
        if let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) {
            self.public_base = format!("https://{host}");
            self.internal_base = format!("https://{host}");
        }
        self
    }

    pub fn admin_base(&self) -> String {
        format!(
            "{}/{}/admin",
            self.internal_base.trim_end_matches('/'),
            self.locale
        )
    }

    /// Base URLs the session cookies must be registered for.
    pub fn cookie_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let mut urls = Vec::with_capacity(2);
        for base in [&self.public_base, &self.internal_base] {
            let url = Url::parse(base).map_err(|err| ConfigError::InvalidUrl {
                url: base.clone(),
                message: err.to_string(),
            })?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `~/.amorc`, if a home directory is known.
pub fn default_rc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(RC_FILENAME))
}

/// Load the configuration from `path`, then apply `AMO_HOST`.
///
/// A missing file yields the defaults. The file may hold secrets, so on Unix
/// it is refused unless only the owner can access it.
pub fn load_config(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    let host = env::var(HOST_ENV).ok();
    Ok(read_rc_file(path)?.with_host_override(host.as_deref()))
}

fn read_rc_file(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            amo_debug!("No config file at {:?}, using defaults", path);
            return Ok(ConsoleConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    check_permissions(path, &metadata)?;

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim_start().starts_with('[') {
        return Err(ConfigError::LegacyIni {
            path: path.to_path_buf(),
        });
    }
    if content.trim().is_empty() {
        return Ok(ConsoleConfig::default());
    }

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &fs::Metadata) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &fs::Metadata) -> Result<(), ConfigError> {
    Ok(())
}
