//! Media library and query-parsing collaborator contracts.
//!
//! Both traits are consumed only on the player thread (queue construction
//! happens inside a command handler), so neither needs `Sync`-safe interior
//! mutability beyond what the implementor chooses.

use crate::error::PlaybackResult;
use crate::state::SortKey;

/// Metadata for a single media item, as returned by [`MediaLibrary::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub id: u32,
    pub path: String,
    pub title: String,
    pub album: Option<String>,
    /// Disabled items fail to open; the caller is expected to skip forward.
    pub disabled: bool,
}

/// A single row from [`MediaLibrary::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSummary {
    pub id: u32,
    pub title: String,
    pub album: Option<String>,
}

/// An opaque filter produced by [`QueryParser::parse`].
///
/// Opaque to the queue module; only the library that produced it knows how
/// to interpret the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter(pub String);

/// Parses a textual query into an opaque filter understood by [`MediaLibrary`].
pub trait QueryParser: Send + Sync {
    fn parse(&self, query: &str) -> PlaybackResult<QueryFilter>;
}

/// Provides access to the media catalog.
pub trait MediaLibrary: Send + Sync {
    /// Enumerates rows matching `filter`, in the order requested by `sort`.
    fn query(&self, filter: &QueryFilter, sort: SortKey) -> PlaybackResult<Vec<MediaSummary>>;

    /// Fetches full metadata for a single item by id.
    fn fetch(&self, id: u32) -> PlaybackResult<MediaMetadata>;
}

/// A `QueryParser` that accepts any non-empty string as a filter verbatim.
///
/// Used by the demo binary and tests; a real deployment would parse a
/// structured predicate language here.
pub struct PassthroughQueryParser;

impl QueryParser for PassthroughQueryParser {
    fn parse(&self, query: &str) -> PlaybackResult<QueryFilter> {
        if query.trim().is_empty() {
            return Err(crate::error::PlaybackError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        Ok(QueryFilter(query.to_string()))
    }
}
