//! Heading ids and table of contents (tree stage).

use crate::content::{Document, Field, TocEntry};
use crate::core::slug::HeadingSlugger;
use crate::pipeline::{Contract, StageContext, Transformer, TreeStage};
use anyhow::Result;
use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd};

const NAME: &str = "toc";

pub struct TocPlugin;

impl Transformer for TocPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tree_stage(&self) -> Option<&dyn TreeStage> {
        Some(self)
    }
}

impl Contract for TocPlugin {
    fn requires(&self) -> &'static [Field] {
        &[Field::FrontMatter, Field::Tree]
    }

    fn provides(&self) -> &'static [Field] {
        &[Field::Toc]
    }
}

impl TreeStage for TocPlugin {
    fn transform_tree(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        let opts = &ctx.config.plugins.toc;
        let enabled = doc
            .frontmatter
            .require(NAME)?
            .enable_toc
            .unwrap_or(opts.show_by_default);

        doc.tree.require(NAME)?;
        let headings = doc
            .tree
            .get_mut()
            .map(|tree| assign_heading_ids(tree))
            .unwrap_or_default();

        let entries = if enabled {
            outline(&headings, opts.max_depth, opts.min_entries)
        } else {
            Vec::new()
        };
        doc.toc.set(NAME, entries)?;
        Ok(())
    }
}

struct Heading {
    level: u8,
    text: String,
    id: String,
}

/// Give every heading an id (keeping explicit `{#id}` attributes) and
/// collect its level and plain text.
fn assign_heading_ids(tree: &mut [Event<'static>]) -> Vec<Heading> {
    let mut slugger = HeadingSlugger::new();
    let mut headings = Vec::new();

    let mut i = 0;
    while i < tree.len() {
        let Event::Start(Tag::Heading { level, .. }) = &tree[i] else {
            i += 1;
            continue;
        };
        let level = heading_level(*level);

        let mut text = String::new();
        let mut end = i + 1;
        while end < tree.len() {
            match &tree[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            end += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut tree[i] {
            let assigned = match id {
                Some(explicit) => explicit.to_string(),
                None => {
                    let generated = slugger.slug(&text);
                    *id = Some(CowStr::from(generated.clone()));
                    generated
                }
            };
            headings.push(Heading {
                level,
                text: text.trim().to_string(),
                id: assigned,
            });
        }
        i = end + 1;
    }
    headings
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Entries up to `max_depth`, depths rebased on the shallowest heading.
/// Empty if fewer than `min_entries` qualify.
fn outline(headings: &[Heading], max_depth: u8, min_entries: usize) -> Vec<TocEntry> {
    let kept: Vec<&Heading> = headings.iter().filter(|h| h.level <= max_depth).collect();
    if kept.is_empty() || kept.len() < min_entries {
        return Vec::new();
    }
    let shallowest = kept.iter().map(|h| h.level).min().unwrap_or(1);
    kept.into_iter()
        .map(|h| TocEntry {
            depth: h.level - shallowest,
            text: h.text.clone(),
            id: h.id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::{FrontMatter, test_document};
    use pulldown_cmark::{Options, Parser};
    use std::collections::BTreeSet;

    fn run(config: &SiteConfig, md: &str, enable_toc: Option<bool>) -> Document {
        let mut doc = test_document("page", md);
        let fm = FrontMatter { enable_toc, ..FrontMatter::default() };
        doc.frontmatter.set("frontmatter", fm).unwrap();
        let tree = Parser::new_ext(md, Options::ENABLE_HEADING_ATTRIBUTES)
            .map(Event::into_static)
            .collect();
        doc.tree.set("parse", tree).unwrap();

        let slugs = BTreeSet::new();
        let ctx = StageContext { config, slugs: &slugs };
        TocPlugin.transform_tree(&ctx, &mut doc).unwrap();
        doc
    }

    fn ids(doc: &Document) -> Vec<String> {
        doc.tree
            .get()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_outline_rebased_and_limited() {
        let md = "## Intro\n\n### Details `code`\n\n#### Deep\n\n## Intro\n";
        let doc = run(&SiteConfig::default(), md, None);
        let toc = doc.toc.get().unwrap();
        let summary: Vec<_> = toc.iter().map(|e| (e.depth, e.text.as_str(), e.id.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (0, "Intro", "intro"),
                (1, "Details code", "details-code"),
                (0, "Intro", "intro-1"),
            ]
        );
        // ids are assigned even beyond max depth
        assert_eq!(ids(&doc), vec!["intro", "details-code", "deep", "intro-1"]);
    }

    #[test]
    fn test_explicit_id_kept() {
        let doc = run(&SiteConfig::default(), "# Title {#custom}\n", None);
        assert_eq!(doc.toc.get().unwrap()[0].id, "custom");
    }

    #[test]
    fn test_disabled_by_frontmatter() {
        let doc = run(&SiteConfig::default(), "# A\n## B\n", Some(false));
        assert!(doc.toc.get().unwrap().is_empty());
        assert_eq!(ids(&doc), vec!["a", "b"]);
    }

    #[test]
    fn test_min_entries() {
        let mut config = SiteConfig::default();
        config.plugins.toc.min_entries = 3;
        let doc = run(&config, "# A\n## B\n", None);
        assert!(doc.toc.get().unwrap().is_empty());
    }
}
