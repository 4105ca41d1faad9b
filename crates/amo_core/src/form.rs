use crate::PageRecords;

/// Prefix of the console's repeated form fields (`form-0-status`, ...).
pub const FORM_PREFIX: &str = "form";

/// Lower bound the console expects for `form-MAX_NUM_FORMS`.
pub const MIN_MAX_NUM_FORMS: usize = 1000;

/// Builds the submission payload for one listing page.
///
/// Field order follows the rendered form: add-on status, formset
/// bookkeeping, anti-forgery token, then `status`/`id` per record at the
/// record's own form slot.
pub fn build_page_form(addon_status: &str, token: &str, page: &PageRecords) -> Vec<(String, String)> {
    let count = page.len();
    let mut form = Vec::with_capacity(6 + count * 2);
    form.push(("status".to_string(), addon_status.to_string()));
    form.push((format!("{FORM_PREFIX}-TOTAL_FORMS"), count.to_string()));
    form.push((format!("{FORM_PREFIX}-INITIAL_FORMS"), count.to_string()));
    form.push((format!("{FORM_PREFIX}-MIN_NUM_FORMS"), "0".to_string()));
    form.push((
        format!("{FORM_PREFIX}-MAX_NUM_FORMS"),
        MIN_MAX_NUM_FORMS.max(count).to_string(),
    ));
    form.push(("csrfmiddlewaretoken".to_string(), token.to_string()));

    for record in page.iter() {
        let slot = record.form_slot;
        form.push((
            format!("{FORM_PREFIX}-{slot}-status"),
            record.status.wire_code().to_string(),
        ));
        form.push((format!("{FORM_PREFIX}-{slot}-id"), record.id.to_string()));
    }

    form
}
