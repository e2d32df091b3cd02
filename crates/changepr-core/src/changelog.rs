//! Changelog entry extraction.
//!
//! Given a package's generated `CHANGELOG.md` and its current version, slice
//! out the section under the heading for that version and classify how big a
//! release it was from the severity words in the document's headings.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::markdown::Document;
use crate::severity::BumpLevel;

/// The section of a changelog belonging to one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    /// Markdown between the version heading and the next sibling heading.
    pub content: String,
    /// Highest severity named by any heading in the document.
    pub highest_level: BumpLevel,
}

/// Extract the entry for `version` from changelog text.
///
/// The entry starts after the first heading whose plain text is exactly
/// `version` and ends before the next heading of the same depth. When no
/// heading matches, the whole document is returned.
///
/// `highest_level` is folded over every heading in the document, not just
/// the ones inside the entry. Changelogs written newest-first therefore
/// report the maximum across all historical versions as well.
#[instrument(skip(text), fields(len = text.len()))]
pub fn extract(text: &str, version: &str) -> ChangelogEntry {
    let doc = Document::parse(text);

    let mut highest_level = BumpLevel::Dep;
    let mut start: Option<(usize, u8)> = None;
    let mut end: Option<usize> = None;

    for (index, block) in doc.blocks().iter().enumerate() {
        let Some(depth) = block.heading_depth() else {
            continue;
        };
        let heading = block.plain_text();

        if let Some(level) = BumpLevel::classify(&heading) {
            highest_level = highest_level.max(level);
        }

        match start {
            None if heading == version => start = Some((index, depth)),
            Some((_, start_depth)) if end.is_none() && depth == start_depth => end = Some(index),
            _ => {}
        }
    }

    let content = match start {
        Some((index, _)) => doc.slice(index + 1, end.unwrap_or(doc.len())).to_markdown(),
        None => {
            debug!(version, "no heading for version, using whole changelog");
            doc.to_markdown()
        }
    };

    debug!(%highest_level, found = start.is_some(), "extracted changelog entry");
    ChangelogEntry {
        content,
        highest_level,
    }
}
