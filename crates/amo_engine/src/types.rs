use std::fmt;

use scraper::Html;
use serde::de::DeserializeOwned;
use url::Url;

use crate::decode::{decode_body, DecodedBody};
use crate::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

/// One request to the console, independent of the HTTP client in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleRequest {
    pub method: Method,
    pub uri: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// JSON body; takes the place of the form when set.
    pub json: Option<serde_json::Value>,
}

impl ConsoleRequest {
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri.into())
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::Post, uri.into())
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::Put, uri.into())
    }

    fn new(method: Method, uri: String) -> Self {
        Self {
            method,
            uri,
            query: Vec::new(),
            form: Vec::new(),
            headers: Vec::new(),
            json: None,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = fields;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Target URL with the query pairs appended.
    pub fn url(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.uri)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Response as seen by the console pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleResponse {
    pub status: u16,
    /// URL the response was served from, after any followed redirects.
    pub final_url: Url,
    pub location: Option<String>,
    pub set_cookies: Vec<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ConsoleResponse {
    pub fn html(final_url: Url, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            final_url,
            location: None,
            set_cookies: Vec::new(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into().into_bytes(),
        }
    }

    pub fn redirect(final_url: Url, status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            final_url,
            location: Some(location.into()),
            set_cookies: Vec::new(),
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.mime_type()
            .is_some_and(|mime| mime.eq_ignore_ascii_case("text/html"))
    }

    pub fn is_json(&self) -> bool {
        self.mime_type()
            .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
    }

    fn mime_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
    }

    pub fn text(&self) -> Result<DecodedBody, DecodeError> {
        Ok(decode_body(&self.body, self.content_type.as_deref())?)
    }

    /// Parsed HTML view. Only available for `text/html` responses.
    pub fn document(&self) -> Result<Html, DecodeError> {
        if !self.is_html() {
            return Err(DecodeError::UnexpectedContentType {
                expected: "text/html",
                actual: self.content_type.clone(),
            });
        }
        let decoded = self.text()?;
        Ok(Html::parse_document(&decoded.text))
    }

    /// Parsed JSON view. Only available for `application/json` responses.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        if !self.is_json() {
            return Err(DecodeError::UnexpectedContentType {
                expected: "application/json",
                actual: self.content_type.clone(),
            });
        }
        serde_json::from_slice(&self.body).map_err(DecodeError::Json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    /// The session was bounced to the identity provider.
    Authorization,
    /// A state-changing request was refused because the session is a dry run.
    DryRun,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Authorization => write!(f, "authorization failed"),
            FailureKind::DryRun => write!(f, "dry run"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
