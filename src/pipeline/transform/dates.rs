//! Created / modified / published dates (tree stage).
//!
//! Each date is taken from the first configured source that has one.
//! Sources are front matter keys and file system metadata; when none
//! applies the date falls back to the build time.

use crate::config::DateSource;
use crate::content::{Dates, Document, Field, FrontMatter};
use crate::log;
use crate::pipeline::{Contract, StageContext, Transformer, TreeStage};
use crate::utils::date::DateTimeUtc;
use anyhow::Result;
use std::fs;
use std::path::Path;

const NAME: &str = "dates";

const CREATED_KEYS: &[&str] = &["date", "created"];
const MODIFIED_KEYS: &[&str] = &["lastmod", "updated", "last-modified", "modified"];
const PUBLISHED_KEYS: &[&str] = &["publishDate", "published", "date"];

pub struct DatesPlugin;

impl Transformer for DatesPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tree_stage(&self) -> Option<&dyn TreeStage> {
        Some(self)
    }
}

impl Contract for DatesPlugin {
    fn requires(&self) -> &'static [Field] {
        &[Field::FrontMatter]
    }

    fn provides(&self) -> &'static [Field] {
        &[Field::Dates]
    }
}

/// Partial set of dates from one source.
#[derive(Debug, Default, Clone, Copy)]
struct Found {
    created: Option<DateTimeUtc>,
    modified: Option<DateTimeUtc>,
    published: Option<DateTimeUtc>,
}

impl TreeStage for DatesPlugin {
    fn transform_tree(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        let fm = doc.frontmatter.require(NAME)?;

        let mut found = Found::default();
        for source in &ctx.config.plugins.dates.priority {
            let next = match source {
                DateSource::Frontmatter => from_frontmatter(fm, &doc.source),
                DateSource::Filesystem => from_filesystem(&doc.full_path),
            };
            found.created = found.created.or(next.created);
            found.modified = found.modified.or(next.modified);
            found.published = found.published.or(next.published);
        }

        let now = DateTimeUtc::now();
        let created = found.created.unwrap_or(now);
        let dates = Dates {
            created,
            modified: found.modified.unwrap_or(created),
            published: found.published.unwrap_or(created),
        };
        doc.dates.set(NAME, dates)?;
        Ok(())
    }
}

fn from_frontmatter(fm: &FrontMatter, source: &Path) -> Found {
    let pick = |keys: &[&str]| {
        let raw = fm.first_str(keys)?;
        let parsed = DateTimeUtc::parse(raw);
        if parsed.is_none() {
            log!("warning"; "{}: ignoring unparseable date `{raw}`", source.display());
        }
        parsed
    };
    Found {
        created: pick(CREATED_KEYS),
        modified: pick(MODIFIED_KEYS),
        published: pick(PUBLISHED_KEYS),
    }
}

fn from_filesystem(path: &Path) -> Found {
    let Ok(meta) = fs::metadata(path) else {
        return Found::default();
    };
    let modified = meta.modified().ok().map(DateTimeUtc::from_system_time);
    let created = meta
        .created()
        .ok()
        .map(DateTimeUtc::from_system_time)
        .or(modified);
    Found {
        created,
        modified,
        published: created,
    }
}
