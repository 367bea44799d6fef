//! Internal link resolution (tree stage) and external link marking
//! (render stage).
//!
//! Internal destinations are resolved to slugs and rewritten as relative
//! URLs from the current page:
//!
//! ```text
//! page `notes/a`, link `b.md#x`       → ../b#x        (from content root)
//! page `notes/a`, link `./c.md`       → ../notes/c    (from current folder)
//! page `notes/a`, link `https://...`  → unchanged, class="external"
//! ```
//!
//! Only links to documents discovered in the same pass are recorded as
//! outgoing links; dangling ones are still rewritten.

use crate::content::{Document, Field};
use crate::core::slug::{Slug, slugify_file_path};
use crate::debug;
use crate::pipeline::{Contract, RenderStage, StageContext, Transformer, TreeStage};
use crate::utils::link::{is_external_link, split_path_fragment};
use anyhow::Result;
use pulldown_cmark::{CowStr, Event, Tag};
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = "links";

static EXTERNAL_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a href="(https?://[^"]*)""#).expect("external anchor regex is valid")
});

pub struct LinksPlugin;

/// Tree-stage half: owns [`Field::Links`].
struct Resolve;

/// Render-stage half: decorates external anchors.
struct MarkExternal;

impl Transformer for LinksPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tree_stage(&self) -> Option<&dyn TreeStage> {
        Some(&Resolve)
    }

    fn render_stage(&self) -> Option<&dyn RenderStage> {
        Some(&MarkExternal)
    }
}

impl Contract for Resolve {
    fn requires(&self) -> &'static [Field] {
        &[Field::Tree]
    }

    fn provides(&self) -> &'static [Field] {
        &[Field::Links]
    }
}

impl TreeStage for Resolve {
    fn transform_tree(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        doc.tree.require(NAME)?;
        let from = doc.slug.clone();
        let mut outgoing: Vec<Slug> = Vec::new();

        if let Some(tree) = doc.tree.get_mut() {
            for event in tree.iter_mut() {
                let (dest_url, is_link) = match event {
                    Event::Start(Tag::Link { dest_url, .. }) => (dest_url, true),
                    Event::Start(Tag::Image { dest_url, .. }) => (dest_url, false),
                    _ => continue,
                };
                let Some((target, fragment)) = resolve(&from, dest_url) else {
                    continue;
                };
                let href = format!("{}{fragment}", from.relative_to(&target));
                *dest_url = CowStr::from(href);
                if !is_link || outgoing.contains(&target) {
                    continue;
                }
                if ctx.slugs.contains(&target) {
                    outgoing.push(target);
                } else {
                    debug!("links"; "{}: no document for `{target}`", doc.source.display());
                }
            }
        }

        doc.links.set(NAME, outgoing)?;
        Ok(())
    }
}

/// Resolve an internal destination against the page at `from`.
///
/// Returns `None` for external links, pure fragments and empty hrefs.
/// The returned fragment keeps its `#`.
fn resolve(from: &Slug, dest: &str) -> Option<(Slug, String)> {
    if dest.is_empty() || dest.starts_with('#') || is_external_link(dest) {
        return None;
    }
    let (path, fragment) = split_path_fragment(dest);
    let path = percent_encoding::percent_decode_str(path).decode_utf8_lossy();

    let joined = if path.starts_with("./") || path.starts_with("../") {
        let folder = match from.as_str().rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        normalize(&format!("{folder}/{path}"))
    } else {
        normalize(&path)
    };
    let fragment = if fragment.is_empty() {
        String::new()
    } else {
        format!("#{fragment}")
    };
    let slug = slugify_file_path(&joined);
    if slug.is_empty() {
        return Some((Slug::new("index"), fragment));
    }
    Some((Slug::new(slug), fragment))
}

/// Collapse `.` and `..` segments.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    let trailing = if path.ends_with('/') { "/index" } else { "" };
    format!("{}{trailing}", parts.join("/"))
}

impl Contract for MarkExternal {
    fn requires(&self) -> &'static [Field] {
        &[Field::Rendered]
    }
}

impl RenderStage for MarkExternal {
    fn transform_render(&self, _ctx: &StageContext<'_>, doc: &mut Document) -> Result<()> {
        doc.rendered.require(NAME)?;
        if let Some(html) = doc.rendered.get_mut()
            && EXTERNAL_ANCHOR.is_match(html)
        {
            *html = EXTERNAL_ANCHOR
                .replace_all(html, r#"<a href="$1" class="external" rel="noopener noreferrer""#)
                .into_owned();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::test_document;
    use pulldown_cmark::{Parser, html};
    use std::collections::BTreeSet;

    /// Run both halves on `md` at `slug`, with `known` as the pass's documents.
    fn run(slug: &str, md: &str, known: &[&str]) -> Document {
        let config = SiteConfig::default();
        let slugs: BTreeSet<Slug> = known.iter().copied().map(Slug::new).collect();
        let ctx = StageContext { config: &config, slugs: &slugs };

        let mut doc = test_document(slug, md);
        let tree = Parser::new(md).map(Event::into_static).collect();
        doc.tree.set("parse", tree).unwrap();
        Resolve.transform_tree(&ctx, &mut doc).unwrap();

        let mut out = String::new();
        html::push_html(&mut out, doc.tree.get().unwrap().iter().cloned());
        doc.rendered.set("render", out).unwrap();
        MarkExternal.transform_render(&ctx, &mut doc).unwrap();
        doc
    }

    fn links(doc: &Document) -> Vec<&str> {
        doc.links.get().unwrap().iter().map(Slug::as_str).collect()
    }

    #[test]
    fn test_root_relative_markdown_link() {
        let doc = run("notes/a", "[b](other/My%20Page.md#sec)", &["other/My-Page"]);
        assert_eq!(links(&doc), vec!["other/My-Page"]);
        assert!(doc.rendered.get().unwrap().contains(r#"href="../other/My-Page#sec""#));
    }

    #[test]
    fn test_folder_relative_link() {
        let doc = run("notes/a", "[c](./c.md) [up](../top.md)", &["notes/c", "top"]);
        assert_eq!(links(&doc), vec!["notes/c", "top"]);
    }

    #[test]
    fn test_folder_link_points_at_index() {
        let doc = run("a", "[docs](docs/)", &["docs/index"]);
        assert_eq!(links(&doc), vec!["docs/index"]);
        assert!(doc.rendered.get().unwrap().contains(r#"href="./docs/""#));
    }

    #[test]
    fn test_external_marked_not_collected() {
        let doc = run("a", "[x](https://example.com) [y](#local)", &[]);
        assert!(links(&doc).is_empty());
        let html = doc.rendered.get().unwrap();
        assert!(html.contains(r#"<a href="https://example.com" class="external" rel="noopener noreferrer">"#));
        assert!(html.contains(r##"href="#local""##));
    }

    #[test]
    fn test_duplicate_targets_once() {
        let doc = run("a", "[1](b.md) [2](b.md#x)", &["b"]);
        assert_eq!(links(&doc), vec!["b"]);
    }

    #[test]
    fn test_dangling_link_rewritten_not_recorded() {
        let doc = run("notes/a", "[gone](gone.md) [b](b.md)", &["b"]);
        assert_eq!(links(&doc), vec!["b"]);
        assert!(doc.rendered.get().unwrap().contains(r#"href="../gone""#));
    }
}
