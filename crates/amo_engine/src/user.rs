use std::sync::Arc;

use amo_logging::amo_info;
use scraper::{ElementRef, Html};

use crate::{ConsoleConfig, ConsoleError, ConsoleRequest, FailureKind, Transport, TransportError};

/// Cookie the console uses to carry flash messages back after a POST.
const MESSAGES_COOKIE: &str = "messages";
const BANNED_MESSAGE: &str = "has been banned";

/// Admin change page of one user profile.
pub struct UserAdminPage {
    transport: Arc<dyn Transport>,
    admin_base: String,
    user_id: String,
    form: Option<Vec<(String, String)>>,
}

impl UserAdminPage {
    pub fn new(transport: Arc<dyn Transport>, config: &ConsoleConfig, user_id: impl Into<String>) -> Self {
        Self {
            transport,
            admin_base: config.admin_base(),
            user_id: user_id.into(),
            form: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fields of the change form as last loaded.
    pub fn form(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    fn profile_url(&self, action: &str) -> String {
        format!(
            "{}/models/users/userprofile/{}/{action}/",
            self.admin_base.trim_end_matches('/'),
            self.user_id
        )
    }

    pub async fn load(&mut self) -> Result<&[(String, String)], ConsoleError> {
        let response = self
            .transport
            .request(ConsoleRequest::get(self.profile_url("change")))
            .await?;
        if response.status != 200 {
            return Err(TransportError::new(
                FailureKind::HttpStatus(response.status),
                format!("change page of user {}", self.user_id),
            )
            .into());
        }
        let fields = form_fields(&response.document()?);
        Ok(self.form.insert(fields).as_slice())
    }

    pub async fn ensure_loaded(&mut self) -> Result<(), ConsoleError> {
        if self.form.is_none() {
            self.load().await?;
        }
        Ok(())
    }

    /// Resubmit the change form to the ban endpoint.
    ///
    /// The console always redirects, so success is read from the flash
    /// message cookie it sets.
    pub async fn ban(&mut self) -> Result<(), ConsoleError> {
        self.ensure_loaded().await?;
        let form = self.form.clone().unwrap_or_default();
        let request = ConsoleRequest::post(self.profile_url("ban"))
            .form(form)
            .header("Referer", self.profile_url("change"));
        let response = self.transport.request(request).await?;

        let message = response
            .set_cookies
            .iter()
            .find(|cookie| cookie.starts_with(MESSAGES_COOKIE));
        match message {
            Some(message) if message.contains(BANNED_MESSAGE) => {
                amo_info!("User {} has been banned", self.user_id);
                Ok(())
            }
            Some(message) => Err(ConsoleError::BanFailed {
                user: self.user_id.clone(),
                reason: message.clone(),
            }),
            None => Err(ConsoleError::BanFailed {
                user: self.user_id.clone(),
                reason: format!("no confirmation message (status {})", response.status),
            }),
        }
    }
}

/// Name/value pairs of the first form's inputs, submit buttons excluded.
fn form_fields(document: &Html) -> Vec<(String, String)> {
    let Some(form) = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form")
    else {
        return Vec::new();
    };

    let mut fields: Vec<(String, String)> = Vec::new();
    let inputs = form
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "input");
    for input in inputs {
        let element = input.value();
        if element
            .attr("type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case("submit"))
        {
            continue;
        }
        let Some(name) = element.attr("name") else {
            continue;
        };
        let value = element.attr("value").unwrap_or_default().to_string();
        // later inputs with the same name win, as in a keyed form object
        match fields.iter_mut().find(|(existing, _)| existing == name) {
            Some(field) => field.1 = value,
            None => fields.push((name.to_string(), value)),
        }
    }
    fields
}
