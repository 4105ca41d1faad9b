#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use amo_engine::{ConsoleRequest, ConsoleResponse, FailureKind, Method, Transport, TransportError};
use url::Url;

pub const BASE: &str = "https://console.test";
pub const ADMIN: &str = "https://console.test/en-US/admin";

/// Status cell content of a fixture row.
#[derive(Debug, Clone, Copy)]
pub enum Cell {
    Status(u8),
    Deleted,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub version: Option<(&'static str, u64, &'static str)>,
    pub file_id: u64,
    pub platform: &'static str,
    pub status: Cell,
    pub slot: usize,
}

/// Primary row opening the version block `name`.
pub fn primary(name: &'static str, version_id: u64, file_id: u64, slot: usize, status: Cell) -> Row {
    Row {
        version: Some((name, version_id, "Listed")),
        file_id,
        platform: "All Platforms",
        status,
        slot,
    }
}

/// Continuation row for the preceding version block.
pub fn continuation(file_id: u64, slot: usize, status: Cell) -> Row {
    Row {
        version: None,
        file_id,
        platform: "Android",
        status,
        slot,
    }
}

fn status_cell(row: &Row) -> String {
    match row.status {
        Cell::Deleted => format!(
            r#"<td><input type="hidden" name="form-{slot}-id" value="{id}">Deleted</td>"#,
            slot = row.slot,
            id = row.file_id
        ),
        Cell::Status(code) => {
            let options = [(4u8, "Approved"), (5, "Disabled"), (3, "Awaiting Review")]
                .iter()
                .map(|(value, label)| {
                    let selected = if *value == code { " selected" } else { "" };
                    format!(r#"<option value="{value}"{selected}>{label}</option>"#)
                })
                .collect::<String>();
            format!(
                r#"<td><input type="hidden" name="form-{slot}-id" value="{id}"><select name="form-{slot}-status">{options}</select></td>"#,
                slot = row.slot,
                id = row.file_id
            )
        }
    }
}

fn render_row(row: &Row) -> String {
    let head = match row.version {
        Some((name, version_id, channel)) => format!(
            r#"<td>Jan. {day}, 2024</td><td><a href="/versions/{version_id}" title="{version_id}">{name}</a></td><td>{channel}</td>"#,
            day = version_id % 28 + 1
        ),
        None => r#"<td colspan="3"></td>"#.to_string(),
    };
    format!(
        r#"<tr>{head}<td><a href="/files/{id}" title="file-{id}.xpi">{id}</a></td><td>{platform}</td>{status}<td><a href="/files/{id}/hash" title="sha256:{id:08x}">hash</a></td></tr>"#,
        id = row.file_id,
        platform = row.platform,
        status = status_cell(row),
    )
}

/// Listing page markup as the console renders it.
pub fn listing_html(page_count: usize, rows: &[Row]) -> String {
    let body: String = rows.iter().map(render_row).collect();
    let pager = if page_count > 1 {
        let items: String = (1..=page_count)
            .map(|n| format!(r#"<li><a href="?page={n}">{n}</a></li>"#))
            .collect();
        format!(
            r#"<div class="listing-footer"><ol class="pagination">{items}<li><a href="?page=2">Next</a></li></ol></div>"#
        )
    } else {
        String::new()
    };
    format!(
        r#"<!DOCTYPE html><html><body>
<form method="post" id="addon-manage">
<input type="hidden" name="csrfmiddlewaretoken" value="tok-123">
<select name="status" id="id_status"><option value="3">Awaiting Review</option><option value="4" selected>Approved</option></select>
<table>
<thead><tr><th>Date</th><th>Version</th><th>Channel</th><th>File</th><th>Platforms</th><th>Status</th><th>Hash</th></tr></thead>
<tbody>{body}</tbody>
</table>
{pager}
</form>
</body></html>"#
    )
}

pub fn url(path: &str) -> Url {
    Url::parse(&format!("{BASE}{path}")).unwrap()
}

pub fn manage_path(slug: &str) -> String {
    format!("/en-US/admin/addon/manage/{slug}/")
}

type Responder = dyn Fn(&ConsoleRequest) -> Result<ConsoleResponse, TransportError> + Send + Sync;

/// In-process transport answering from a closure and recording every request.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ConsoleRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ConsoleRequest) -> Result<ConsoleResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Serves `pages[n - 1]` for `?page=n` under the slug's manage URL and
    /// redirects every POST back to it.
    pub fn console(slug: &'static str, pages: Vec<String>) -> Arc<Self> {
        Self::new(move |request| match request.method {
            Method::Get => serve_listing(slug, &pages, request),
            _ => accept_commit(slug),
        })
    }

    pub fn requests(&self) -> Vec<ConsoleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn posts(&self) -> Vec<ConsoleRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post)
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: ConsoleRequest) -> Result<ConsoleResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(&request)
    }
}

/// Answer a listing GET as if the console had redirected to the slug.
pub fn serve_listing(
    slug: &str,
    pages: &[String],
    request: &ConsoleRequest,
) -> Result<ConsoleResponse, TransportError> {
    let page = page_param(request);
    let html = page
        .checked_sub(1)
        .and_then(|i| pages.get(i))
        .cloned()
        .ok_or_else(|| TransportError::new(FailureKind::HttpStatus(404), "no such page"))?;
    let final_url = url(&format!("{}?page={page}", manage_path(slug)));
    Ok(ConsoleResponse::html(final_url, html))
}

/// The console's answer to an accepted formset.
pub fn accept_commit(slug: &str) -> Result<ConsoleResponse, TransportError> {
    Ok(ConsoleResponse::redirect(
        url(&manage_path(slug)),
        302,
        manage_path(slug),
    ))
}

pub fn page_param(request: &ConsoleRequest) -> usize {
    request
        .query
        .iter()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1)
}

/// `form-N-status` / `form-N-id` pairs of a submitted form, in field order.
pub fn submitted_files(request: &ConsoleRequest) -> Vec<(String, String)> {
    let statuses: Vec<(&str, &str)> = request
        .form
        .iter()
        .filter(|(k, _)| k.starts_with("form-") && k.ends_with("-status"))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    statuses
        .into_iter()
        .map(|(key, status)| {
            let id_key = key.replace("-status", "-id");
            let id = request.form_value(&id_key).unwrap_or_default().to_string();
            (id, status.to_string())
        })
        .collect()
}
