use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use amo_logging::{amo_debug, amo_info, amo_warn};
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use url::Url;

use crate::{
    ConfigError, ConsoleConfig, ConsoleRequest, ConsoleResponse, FailureKind, Method,
    TransportError,
};

/// Request capability the console pages are written against.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ConsoleRequest) -> Result<ConsoleResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Host of the identity provider; landing there means the session is gone.
    pub identity_host: String,
    pub dry_run: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ConsoleConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            redirect_limit: config.redirect_limit,
            max_bytes: config.max_body_bytes,
            identity_host: config.identity_host.clone(),
            dry_run: config.dry_run,
        }
    }
}

/// Cookie-carrying console session over reqwest.
///
/// GET requests follow redirects up to the configured limit so callers see
/// the canonical URL. POST requests never follow: the console answers a
/// successful form submission with a 302.
#[derive(Debug, Clone)]
pub struct ReqwestSession {
    client: reqwest::Client,
    jar: Arc<Jar>,
    settings: SessionSettings,
}

impl ReqwestSession {
    pub fn new(settings: SessionSettings) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(jar.clone())
            .user_agent(concat!("amo-moderation/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            jar,
            settings,
        })
    }

    /// Session with the configured credentials already in the cookie jar.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, SessionSetupError> {
        let session = Self::new(SessionSettings::from_config(config))?;
        let urls = config.cookie_urls()?;
        if let Some(id) = config.auth.session_id.as_deref() {
            session.load_session_id(id, &urls);
        }
        if let Some(path) = config.auth.cookie_file.as_deref() {
            session.load_cookies(path, &urls)?;
        }
        Ok(session)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Store the console `sessionid` cookie for every given base URL.
    pub fn load_session_id(&self, id: &str, urls: &[Url]) {
        for url in urls {
            self.jar.add_cookie_str(&format!("sessionid={id}"), url);
        }
    }

    /// Store every `name: value` pair of a JSON cookie file for every given base URL.
    pub fn load_cookies(&self, path: &Path, urls: &[Url]) -> Result<usize, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cookies: BTreeMap<String, String> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for (name, value) in &cookies {
            for url in urls {
                self.jar.add_cookie_str(&format!("{name}={value}"), url);
            }
        }
        amo_debug!("Loaded {} cookies from {:?}", cookies.len(), path);
        Ok(cookies.len())
    }

    fn is_identity_host(&self, url: &Url) -> bool {
        let identity = self.settings.identity_host.as_str();
        url.host_str().is_some_and(|host| {
            host.eq_ignore_ascii_case(identity)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", identity.to_ascii_lowercase()))
        })
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(TransportError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(TransportError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestSession {
    async fn request(&self, request: ConsoleRequest) -> Result<ConsoleResponse, TransportError> {
        let mut url = request.url()?;

        if self.settings.dry_run && request.method != Method::Get {
            amo_info!(
                "Dry run: not sending {} {} ({} form fields)",
                request.method,
                url,
                request.form.len()
            );
            amo_debug!("Dry run form: {:?}", request.form);
            return Err(TransportError::new(
                FailureKind::DryRun,
                format!("{} {url} not sent", request.method),
            ));
        }

        let mut redirects = 0;
        loop {
            let mut builder = match request.method {
                Method::Get => self.client.get(url.clone()),
                Method::Post => self.client.post(url.clone()),
                Method::Put => self.client.put(url.clone()),
            };
            if request.method != Method::Get {
                builder = match &request.json {
                    Some(body) => builder.json(body),
                    None => builder.form(&request.form),
                };
            }
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            amo_debug!("{} {}", request.method, url);
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();

            if self.is_identity_host(&url) {
                return Err(TransportError::new(
                    FailureKind::Authorization,
                    format!("served from identity provider {url}"),
                ));
            }

            let location = header_string(&response, LOCATION);
            if status.is_redirection() {
                if let Some(target) = location.as_deref().and_then(|loc| url.join(loc).ok()) {
                    if self.is_identity_host(&target) {
                        amo_warn!("Console redirected to the identity provider; session expired?");
                        return Err(TransportError::new(
                            FailureKind::Authorization,
                            format!("redirected to identity provider {target}"),
                        ));
                    }
                    if request.method == Method::Get {
                        redirects += 1;
                        if redirects > self.settings.redirect_limit {
                            return Err(TransportError::new(
                                FailureKind::RedirectLimitExceeded,
                                format!("more than {} redirects", self.settings.redirect_limit),
                            ));
                        }
                        url = target;
                        continue;
                    }
                }
            }

            let set_cookies = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(str::to_string)
                .collect();
            let content_type = header_string(&response, CONTENT_TYPE);
            let body = self.read_body(response).await?;

            return Ok(ConsoleResponse {
                status: status.as_u16(),
                final_url: url,
                location,
                set_cookies,
                content_type,
                body,
            });
        }
    }
}

/// Building a session from configuration touches both the client and the cookie file.
#[derive(Debug, thiserror::Error)]
pub enum SessionSetupError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return TransportError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}
