use amo_core::{FileRecord, FileStatus, FormSlot, VersionInfo};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;

use crate::DecodeError;

/// Visible status text of a file that can no longer be edited.
const DELETED_LABEL: &str = "Deleted";

/// Layout of a listing row.
///
/// A version with several files renders the version block once; every
/// further file of that version gets a continuation row whose first cell
/// spans the date, version and channel columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Primary,
    Continuation,
}

/// 1-based positions of the version block, read from primary rows only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VersionColumns {
    date: usize,
    version: usize,
    channel: usize,
}

/// 1-based positions of the file-identifying cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileColumns {
    pub file: usize,
    pub platforms: usize,
    pub status: usize,
    pub hash: usize,
}

const VERSION_COLUMNS: VersionColumns = VersionColumns {
    date: 1,
    version: 2,
    channel: 3,
};

const NOMINAL_FILE_COLUMNS: FileColumns = FileColumns {
    file: 4,
    platforms: 5,
    status: 6,
    hash: 7,
};

/// Columns collapsed into the spanning first cell of a continuation row.
const CONTINUATION_SPAN: usize = 3;

impl RowKind {
    pub fn of(row: ElementRef<'_>) -> Self {
        let spans_version_block = cells(row)
            .first()
            .and_then(|cell| cell.value().attr("colspan"))
            .and_then(|span| span.trim().parse::<usize>().ok())
            == Some(CONTINUATION_SPAN);
        if spans_version_block {
            RowKind::Continuation
        } else {
            RowKind::Primary
        }
    }

    /// Offset applied to the nominal file columns.
    pub const fn row_base(self) -> isize {
        match self {
            RowKind::Primary => 0,
            RowKind::Continuation => 1 - CONTINUATION_SPAN as isize,
        }
    }

    pub const fn file_columns(self) -> FileColumns {
        let base = self.row_base();
        FileColumns {
            file: NOMINAL_FILE_COLUMNS.file.saturating_add_signed(base),
            platforms: NOMINAL_FILE_COLUMNS.platforms.saturating_add_signed(base),
            status: NOMINAL_FILE_COLUMNS.status.saturating_add_signed(base),
            hash: NOMINAL_FILE_COLUMNS.hash.saturating_add_signed(base),
        }
    }
}

#[derive(Debug, Clone)]
struct VersionBlock {
    date: String,
    version: VersionInfo,
}

/// Decodes listing rows in document order.
///
/// Continuation rows inherit the version block of the last primary row seen
/// by this decoder, so one decoder must be used per page.
#[derive(Debug, Default)]
pub struct RowDecoder {
    rows_seen: usize,
    block: Option<VersionBlock>,
}

impl RowDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, row: ElementRef<'_>) -> Result<FileRecord, DecodeError> {
        self.rows_seen += 1;
        let index = self.rows_seen;
        let cells = cells(row);
        let kind = RowKind::of(row);

        if kind == RowKind::Primary {
            self.block = Some(read_version_block(&cells, index)?);
        }
        let block = self
            .block
            .as_ref()
            .ok_or(DecodeError::OrphanContinuation { row: index })?;

        let columns = kind.file_columns();
        let file_link = link(cell(&cells, columns.file, index)?, "file link", index)?;
        let id = parse_number(&text_of(file_link), "file id", index)?;
        let name = attribute(file_link, "title", "file link", index)?;
        let platforms = text_of(cell(&cells, columns.platforms, index)?);
        let (status, form_slot) = read_status(row, cell(&cells, columns.status, index)?, index)?;
        let hash_link = link(cell(&cells, columns.hash, index)?, "hash link", index)?;
        let hash = attribute(hash_link, "title", "hash link", index)?;

        Ok(FileRecord {
            id,
            name,
            date: block.date.clone(),
            version: block.version.clone(),
            platforms,
            status,
            hash,
            form_slot,
        })
    }
}

fn read_version_block(cells: &[ElementRef<'_>], index: usize) -> Result<VersionBlock, DecodeError> {
    let date = text_of(cell(cells, VERSION_COLUMNS.date, index)?);
    let version_link = link(
        cell(cells, VERSION_COLUMNS.version, index)?,
        "version link",
        index,
    )?;
    let version_id = parse_number(
        &attribute(version_link, "title", "version link", index)?,
        "version id",
        index,
    )?;
    let channel = text_of(cell(cells, VERSION_COLUMNS.channel, index)?);

    Ok(VersionBlock {
        date,
        version: VersionInfo {
            id: version_id,
            name: text_of(version_link),
            channel,
        },
    })
}

/// Status and form slot of a row.
///
/// A deleted file shows the plain label and has no status control; its slot
/// comes from the row's remaining formset fields (the hidden `form-N-id`).
fn read_status(
    row: ElementRef<'_>,
    status_cell: ElementRef<'_>,
    index: usize,
) -> Result<(FileStatus, FormSlot), DecodeError> {
    if text_outside_controls(status_cell) == DELETED_LABEL {
        let slot = row_form_slot(row).ok_or(DecodeError::MissingFormSlot { row: index })?;
        return Ok((FileStatus::Deleted, slot));
    }

    let select = find_element(status_cell, "select").ok_or(DecodeError::MissingElement {
        row: index,
        what: "status control",
    })?;
    let control_name = attribute(select, "name", "status control", index)?;
    let slot = form_slot(&control_name).ok_or(DecodeError::MissingFormSlot { row: index })?;

    let value = selected_value(select).ok_or(DecodeError::MissingElement {
        row: index,
        what: "status option",
    })?;
    let status = value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(FileStatus::from_code)
        .ok_or_else(|| DecodeError::UnknownStatus {
            row: index,
            value: value.clone(),
        })?;

    Ok((status, slot))
}

/// Ordinal of a formset field name such as `form-12-status`.
pub fn form_slot(field_name: &str) -> Option<FormSlot> {
    let rest = field_name.strip_prefix(amo_core::FORM_PREFIX)?.strip_prefix('-')?;
    let (ordinal, _) = rest.split_once('-')?;
    ordinal.parse().ok()
}

fn row_form_slot(row: ElementRef<'_>) -> Option<FormSlot> {
    row.descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| el.value().attr("name"))
        .find_map(form_slot)
}

/// Value of the selected option, falling back to the first option like a browser.
fn selected_value(select: ElementRef<'_>) -> Option<String> {
    let options: Vec<ElementRef<'_>> = select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "option")
        .collect();
    let chosen = options
        .iter()
        .find(|option| option.value().attr("selected").is_some())
        .or_else(|| options.first())?;
    Some(
        chosen
            .value()
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| text_of(*chosen)),
    )
}

/// Direct `<td>` children of a row.
pub(crate) fn cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect()
}

fn cell<'a>(
    cells: &[ElementRef<'a>],
    column: usize,
    index: usize,
) -> Result<ElementRef<'a>, DecodeError> {
    column
        .checked_sub(1)
        .and_then(|i| cells.get(i))
        .copied()
        .ok_or(DecodeError::MissingCell { row: index, column })
}

fn link<'a>(
    cell: ElementRef<'a>,
    what: &'static str,
    index: usize,
) -> Result<ElementRef<'a>, DecodeError> {
    find_element(cell, "a").ok_or(DecodeError::MissingElement { row: index, what })
}

pub(crate) fn find_element<'a>(root: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

fn attribute(
    element: ElementRef<'_>,
    attribute: &'static str,
    what: &'static str,
    index: usize,
) -> Result<String, DecodeError> {
    element
        .value()
        .attr(attribute)
        .map(|value| value.trim().to_string())
        .ok_or(DecodeError::MissingAttribute {
            row: index,
            what,
            attribute,
        })
}

fn parse_number(raw: &str, what: &'static str, index: usize) -> Result<u64, DecodeError> {
    raw.trim().parse().map_err(|_| DecodeError::InvalidNumber {
        row: index,
        what,
        value: raw.to_string(),
    })
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of a cell without the labels of any nested `<select>`.
fn text_outside_controls(cell: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(*cell, &mut text);
    text.trim().to_string()
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if element.name() == "select" => {}
            Node::Element(_) => collect_text(child, out),
            _ => {}
        }
    }
}
