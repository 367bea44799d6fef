//! Site-wide indexes: `sitemap.xml`, `index.xml` (RSS) and
//! `static/contentIndex.json` for client-side search and graph views.
//!
//! `noindex` documents are left out of all three.

use super::feed::{self, FeedItem};
use super::sitemap::SitemapWriter;
use super::{Artifact, Artifacts, EmitContext, Emitter};
use crate::config::SiteConfig;
use crate::content::{Document, DocumentStore};
use crate::log;
use crate::pipeline::Resources;
use anyhow::{Context, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub struct ContentIndex;

/// One entry of `contentIndex.json`.
#[derive(Debug, Serialize)]
struct ContentDetails<'a> {
    slug: &'a str,
    title: &'a str,
    links: Vec<&'a str>,
    aliases: Vec<&'a str>,
    tags: &'a [String],
    content: &'a str,
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

impl Emitter for ContentIndex {
    fn name(&self) -> &'static str {
        "content-index"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        _resources: &'a Resources,
    ) -> Artifacts<'a> {
        let config = ctx.config;
        let opts = &config.plugins.index;
        let docs: Vec<&Document> = ctx
            .published(store)
            .filter(|d| !d.frontmatter.get().is_some_and(|fm| fm.noindex))
            .collect();

        let site_url = config.site.absolute_url("");
        if site_url.is_none() && (opts.sitemap || opts.rss) {
            log!("warning"; "content-index: `site.base_url` is not set, skipping sitemap and RSS");
        }

        let sitemap = site_url
            .as_ref()
            .filter(|_| opts.sitemap)
            .map(|_| sitemap_artifact(config, &docs));
        let rss = site_url
            .as_deref()
            .filter(|_| opts.rss)
            .map(|url| rss_artifact(config, url, &docs));
        let json = std::iter::once(json_artifact(&docs));

        Box::new(sitemap.into_iter().chain(rss).chain(json))
    }
}

fn sitemap_artifact(config: &SiteConfig, docs: &[&Document]) -> Result<Artifact> {
    let mut sitemap = SitemapWriter::new();
    for doc in docs {
        sitemap.push(&page_url(config, doc), doc.dates.get().map(|d| d.modified));
    }
    Ok(Artifact::bytes("sitemap.xml", None, sitemap.finish()))
}

fn rss_artifact(config: &SiteConfig, site_url: &str, docs: &[&Document]) -> Result<Artifact> {
    let opts = &config.plugins.index;
    let mut sorted: Vec<&Document> = docs.to_vec();
    sorted.sort_by(|a, b| feed_order(a, b));

    let items: Vec<FeedItem> = sorted
        .into_iter()
        .filter_map(|doc| {
            let dates = doc.dates.get()?;
            let description = if opts.rss_full_html {
                doc.rendered.get().cloned()
            } else {
                doc.description.get().cloned()
            };
            Some(FeedItem {
                title: doc.title().to_string(),
                link: page_url(config, doc),
                description: description.unwrap_or_default(),
                date: dates.created,
                tags: doc
                    .frontmatter
                    .get()
                    .map(|fm| fm.tags.clone())
                    .unwrap_or_default(),
            })
        })
        .take(opts.rss_limit)
        .collect();

    let xml = feed::render(config, site_url, &items).context("failed to build RSS feed")?;
    Ok(Artifact::bytes("index.xml", None, xml))
}

/// Newest first; undated last; ties by title.
fn feed_order(a: &Document, b: &Document) -> Ordering {
    let date = |d: &Document| d.dates.get().map(|d| d.created);
    match (date(a), date(b)) {
        (Some(x), Some(y)) if x != y => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => a.title().cmp(b.title()),
    }
}

fn page_url(config: &SiteConfig, doc: &Document) -> String {
    let rel = doc.slug.simplify();
    let rel = if rel == "/" { "" } else { rel.as_str() };
    config
        .site
        .absolute_url(rel)
        .unwrap_or_else(|| format!("/{rel}"))
}

fn json_artifact(docs: &[&Document]) -> Result<Artifact> {
    let index: BTreeMap<&str, ContentDetails<'_>> = docs
        .iter()
        .map(|doc| {
            let details = ContentDetails {
                slug: doc.slug.as_str(),
                title: doc.title(),
                links: doc
                    .links
                    .get()
                    .map(|l| l.iter().map(|s| s.as_str()).collect())
                    .unwrap_or_default(),
                aliases: doc
                    .aliases
                    .get()
                    .map(|a| a.iter().map(|s| s.as_str()).collect())
                    .unwrap_or_default(),
                tags: doc
                    .frontmatter
                    .get()
                    .map(|fm| fm.tags.as_slice())
                    .unwrap_or_default(),
                content: doc.plain_text.get().map(String::as_str).unwrap_or_default(),
                description: doc.description.get().map(String::as_str),
                date: doc.dates.get().map(|d| d.created.to_rfc3339()),
            };
            (doc.slug.as_str(), details)
        })
        .collect();

    let json = serde_json::to_vec(&index).context("failed to serialize content index")?;
    Ok(Artifact::bytes("static/contentIndex.json", None, json))
}
