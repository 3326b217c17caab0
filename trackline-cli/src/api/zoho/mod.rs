//! Source feed adapters
//!
//! The sync cycle only sees [`SourceFeed`]: a complete set of raw rows for a
//! query, or a [`FeedError`]. Never a partial set.

mod client;
mod xml;

pub use client::ZohoFeed;
pub use xml::parse_export_xml;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::sync::error::FeedError;
use crate::sync::types::RawRow;

/// Source of raw rows for one query identifier
#[async_trait]
pub trait SourceFeed: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<RawRow>, FeedError>;
}

/// Feed reading a saved XML export from disk
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceFeed for FileFeed {
    async fn fetch(&self, _query: &str) -> Result<Vec<RawRow>, FeedError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FeedError::Request {
                message: format!("failed to read {}: {}", self.path.display(), e),
            })?;
        log::info!("Reading export from {}", self.path.display());
        parse_export_xml(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_feed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<response><result><rows><row><column name="Parent ID">P-7</column></row></rows></result></response>"#
        )
        .unwrap();

        let rows = FileFeed::new(file.path()).fetch("ignored").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Parent ID"], "P-7");
    }

    #[tokio::test]
    async fn test_missing_file_is_feed_error() {
        let feed = FileFeed::new("/no/such/export.xml");
        assert!(matches!(feed.fetch("x").await, Err(FeedError::Request { .. })));
    }
}
