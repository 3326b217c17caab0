//! Analytics XML export parsing

use crate::sync::error::FeedError;
use crate::sync::types::RawRow;

/// Parse an XML export into raw rows
///
/// Every `row` element becomes one row; each child element contributes its
/// `name` attribute as the column and its text as the cell. Columns without
/// a name are ignored, empty elements yield empty cells. An `error` element
/// anywhere in the document fails the whole export.
pub fn parse_export_xml(body: &str) -> Result<Vec<RawRow>, FeedError> {
    let doc = roxmltree::Document::parse(body).map_err(|e| FeedError::Malformed {
        message: format!("invalid XML export: {}", e),
    })?;

    if let Some(error) = doc.descendants().find(|n| n.has_tag_name("error")) {
        let message = error
            .descendants()
            .find(|n| n.has_tag_name("message"))
            .and_then(|n| n.text())
            .or_else(|| error.text())
            .unwrap_or("unknown error")
            .trim()
            .to_string();
        return Err(FeedError::Request { message });
    }

    let rows: Vec<RawRow> = doc
        .descendants()
        .filter(|n| n.has_tag_name("row"))
        .map(|row| {
            row.children()
                .filter(|child| child.is_element())
                .filter_map(|column| {
                    let name = column.attribute("name")?;
                    Some((name.to_string(), column.text().unwrap_or_default().to_string()))
                })
                .collect()
        })
        .collect();

    log::debug!("Parsed {} rows from XML export", rows.len());
    Ok(rows)
}
