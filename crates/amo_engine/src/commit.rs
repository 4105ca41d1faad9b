use amo_core::{build_page_form, ListingState};
use amo_logging::{amo_info, amo_warn};
use futures_util::future::join_all;

use crate::page::manage_url;
use crate::{
    CommitAggregateError, ConsoleError, ConsoleRequest, PageFailure, PageFailureCause, Transport,
};

/// Pages the console accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub pages: Vec<usize>,
}

/// Submit every page of `state` concurrently.
///
/// Each page is judged on its own; a failure never stops the other pages.
/// When any page fails the error lists every failing page, and the pages that
/// went through stay committed. An expired session is one more page failure,
/// see [`CommitAggregateError::authorization_failure`].
pub async fn commit_listing(
    transport: &dyn Transport,
    admin_base: &str,
    state: &ListingState,
) -> Result<CommitReport, ConsoleError> {
    let url = manage_url(admin_base, &state.slug);
    let expected_target = format!("/addon/manage/{}/", state.slug);

    let submissions = state.pages().iter().enumerate().map(|(i, page)| {
        let number = i + 1;
        let request = ConsoleRequest::post(url.clone())
            .form(build_page_form(&state.status, &state.token, page))
            .header("Referer", url.clone());
        let expected_target = expected_target.as_str();
        async move {
            let outcome = submit_page(transport, request, expected_target).await;
            (number, outcome)
        }
    });
    let outcomes = join_all(submissions).await;

    let mut committed = Vec::new();
    let mut failures = Vec::new();
    for (page, outcome) in outcomes {
        match outcome {
            Ok(()) => committed.push(page),
            Err(cause) => {
                amo_warn!("Commit of page {} for {} failed: {}", page, state.slug, cause);
                failures.push(PageFailure { page, cause });
            }
        }
    }

    if failures.is_empty() {
        amo_info!("Committed {} pages for {}", committed.len(), state.slug);
        Ok(CommitReport { pages: committed })
    } else {
        let aggregate = CommitAggregateError {
            failures,
            committed,
        };
        if aggregate.is_authorization() {
            amo_warn!(
                "Session rejected while committing {}; pages {:?} were already saved",
                state.slug,
                aggregate.committed
            );
        }
        Err(aggregate.into())
    }
}

async fn submit_page(
    transport: &dyn Transport,
    request: ConsoleRequest,
    expected_target: &str,
) -> Result<(), PageFailureCause> {
    let response = transport
        .request(request)
        .await
        .map_err(PageFailureCause::Transport)?;
    if response.status != 302 {
        return Err(PageFailureCause::UnexpectedStatus(response.status));
    }
    match response.location {
        Some(location) if location.contains(expected_target) => Ok(()),
        other => Err(PageFailureCause::UnexpectedRedirect(other)),
    }
}
