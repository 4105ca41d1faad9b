use amo_core::PageRecords;
use amo_logging::amo_debug;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::rows::{find_element, text_of, RowDecoder};
use crate::{ConsoleError, ConsoleRequest, DecodeError, FailureKind, Transport, TransportError};

const STATUS_SELECTOR: &str = "#id_status";
const TOKEN_SELECTOR: &str = "input[name='csrfmiddlewaretoken']";
const PAGINATION_SELECTOR: &str = ".listing-footer .pagination";
const ROW_SELECTOR: &str = "table > tbody > tr";

/// One decoded page of an add-on's file listing.
///
/// `status`, `token` and `page_count` are only meaningful on page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// 1-based page number.
    pub number: usize,
    /// Canonical slug taken from the URL the page was served from.
    pub slug: String,
    pub status: Option<String>,
    pub token: Option<String>,
    pub page_count: usize,
    pub records: PageRecords,
}

/// `{admin}/addon/manage/{addon}/`; the addon may be an id, slug or GUID.
pub fn manage_url(admin_base: &str, addon: &str) -> String {
    format!("{}/addon/manage/{addon}/", admin_base.trim_end_matches('/'))
}

/// Fetch and decode one listing page.
pub async fn fetch_listing_page(
    transport: &dyn Transport,
    admin_base: &str,
    addon: &str,
    number: usize,
) -> Result<ListingPage, ConsoleError> {
    let request = ConsoleRequest::get(manage_url(admin_base, addon)).query("page", number);
    let response = transport.request(request).await?;
    if response.status != 200 {
        return Err(TransportError::new(
            FailureKind::HttpStatus(response.status),
            format!("listing page {number} of {addon}"),
        )
        .into());
    }

    let document = response.document()?;
    let page = parse_listing_page(number, &response.final_url, &document)?;
    amo_debug!(
        "Decoded page {}/{} of {} with {} files",
        number,
        page.page_count,
        page.slug,
        page.records.len()
    );
    Ok(page)
}

/// Decode a listing document served from `final_url`.
pub fn parse_listing_page(
    number: usize,
    final_url: &Url,
    document: &Html,
) -> Result<ListingPage, DecodeError> {
    let slug = resolve_slug(final_url)?;
    let status = document
        .select(&selector(STATUS_SELECTOR)?)
        .next()
        .and_then(control_value);
    let token = document
        .select(&selector(TOKEN_SELECTOR)?)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string);
    let page_count = page_count(document)?;

    let mut decoder = RowDecoder::new();
    let mut records = PageRecords::new();
    for row in document.select(&selector(ROW_SELECTOR)?) {
        records.insert(decoder.decode(row)?)?;
    }

    Ok(ListingPage {
        number,
        slug,
        status,
        token,
        page_count,
        records,
    })
}

/// The console redirects any identifier to `.../manage/{slug}/`.
pub fn resolve_slug(final_url: &Url) -> Result<String, DecodeError> {
    final_url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| DecodeError::UnresolvedSlug(final_url.to_string()))
}

/// Text of the second-to-last pager entry (the last one is "next"); 1 without a pager.
fn page_count(document: &Html) -> Result<usize, DecodeError> {
    let Some(pagination) = document.select(&selector(PAGINATION_SELECTOR)?).next() else {
        return Ok(1);
    };
    let items: Vec<ElementRef<'_>> = pagination
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .collect();
    let Some(link) = items
        .len()
        .checked_sub(2)
        .and_then(|i| items.get(i))
        .and_then(|item| find_element(*item, "a"))
    else {
        return Ok(1);
    };

    let text = text_of(link);
    match text.parse::<usize>() {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(DecodeError::InvalidPageCount(text)),
    }
}

/// Current value of an `<input>` or `<select>`.
fn control_value(control: ElementRef<'_>) -> Option<String> {
    if control.value().name() != "select" {
        return control.value().attr("value").map(str::to_string);
    }
    let mut options = control
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "option");
    let first = options.next()?;
    std::iter::once(first)
        .chain(options)
        .find(|option| option.value().attr("selected").is_some())
        .unwrap_or(first)
        .value()
        .attr("value")
        .map(str::to_string)
}

fn selector(css: &'static str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|_| DecodeError::InvalidSelector(css))
}
