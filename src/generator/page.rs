//! HTML pages: one per healthy document, plus `404.html`.

use super::{Artifact, Artifacts, EmitContext, Emitter, PartialEmit};
use crate::config::SiteConfig;
use crate::content::{Document, DocumentStore, TocEntry};
use crate::core::slug::Slug;
use crate::pipeline::{Resources, ScriptLocation};
use crate::utils::html::escape;
use crate::utils::link::is_external_link;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt::Write;

pub struct ContentPage;

impl Emitter for ContentPage {
    fn name(&self) -> &'static str {
        "content-page"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        resources: &'a Resources,
    ) -> Artifacts<'a> {
        Box::new(
            ctx.published(store)
                .map(move |doc| page_artifact(ctx.config, doc, resources)),
        )
    }

    fn partial(&self) -> Option<&dyn PartialEmit> {
        Some(self)
    }
}

impl PartialEmit for ContentPage {
    fn emit_partial<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        resources: &'a Resources,
        changed: &'a BTreeSet<Slug>,
    ) -> Artifacts<'a> {
        Box::new(
            ctx.published(store)
                .filter(move |doc| changed.contains(&doc.slug))
                .map(move |doc| page_artifact(ctx.config, doc, resources)),
        )
    }
}

fn page_artifact(config: &SiteConfig, doc: &Document, resources: &Resources) -> Result<Artifact> {
    let body = doc.rendered.require("content-page")?;
    let page = Page {
        config,
        slug: &doc.slug,
        root: doc.slug.path_to_root(),
        title: doc.title(),
        description: doc.description.get().map(String::as_str),
        resources,
    };

    let mut article = String::with_capacity(body.len() + 512);
    article.push_str("<article>\n");
    let _ = writeln!(article, "<h1 class=\"article-title\">{}</h1>", escape(doc.title()));
    if let Some(meta) = content_meta(doc) {
        let _ = writeln!(article, "<p class=\"content-meta\">{meta}</p>");
    }
    if let Some(toc) = doc.toc.get().filter(|t| !t.is_empty()) {
        article.push_str(&render_toc(toc));
    }
    article.push_str(body);
    article.push_str("</article>\n");

    Ok(Artifact::bytes(
        doc.slug.html_path(),
        Some(doc.slug.clone()),
        page.render(&article),
    ))
}

fn content_meta(doc: &Document) -> Option<String> {
    let dates = doc.dates.get()?;
    let mut meta = dates.created.to_date_string();
    if let Some(rt) = doc.reading_time.get().filter(|rt| rt.minutes > 0) {
        let _ = write!(meta, ", {} min read", rt.minutes);
    }
    Some(meta)
}

fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from("<nav class=\"toc\">\n<h3>Table of Contents</h3>\n<ul>\n");
    for entry in entries {
        let _ = writeln!(
            out,
            "<li class=\"depth-{}\"><a href=\"#{}\">{}</a></li>",
            entry.depth,
            escape(&entry.id),
            escape(&entry.text)
        );
    }
    out.push_str("</ul>\n</nav>\n");
    out
}

// ============================================================================
// 404
// ============================================================================

pub struct NotFoundPage;

impl Emitter for NotFoundPage {
    fn name(&self) -> &'static str {
        "404"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        _store: &'a DocumentStore,
        resources: &'a Resources,
    ) -> Artifacts<'a> {
        // served at arbitrary depths, so resources resolve from the site's base path
        let slug = Slug::new("404");
        let root = ctx
            .config
            .site
            .parsed_base_url()
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        let page = Page {
            config: ctx.config,
            slug: &slug,
            root,
            title: "404",
            description: Some("Page not found"),
            resources,
        };
        let body = "<article>\n<h1>404</h1>\n<p>Either this page is private or doesn't exist.</p>\n</article>\n";
        Box::new(std::iter::once(Ok(Artifact::bytes("404.html", None, page.render(body)))))
    }
}

// ============================================================================
// Template
// ============================================================================

struct Page<'a> {
    config: &'a SiteConfig,
    slug: &'a Slug,
    /// Prefix that turns site-relative hrefs into working ones.
    root: String,
    title: &'a str,
    description: Option<&'a str>,
    resources: &'a Resources,
}

impl Page<'_> {
    fn render(&self, article: &str) -> String {
        let site = &self.config.site;
        let root = self.root.as_str();
        let mut html = String::with_capacity(article.len() + 1024);

        let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>", escape(&site.locale));
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
        let _ = writeln!(html, "<title>{} | {}</title>", escape(self.title), escape(&site.title));
        if let Some(desc) = self.description {
            let _ = writeln!(html, "<meta name=\"description\" content=\"{}\">", escape(desc));
        }
        for href in &self.resources.css {
            let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", escape(&resolve_href(root, href)));
        }
        self.push_scripts(&mut html, ScriptLocation::Head);
        html.push_str("</head>\n");

        let _ = writeln!(html, "<body data-slug=\"{}\">", escape(self.slug.as_str()));
        html.push_str(article);
        self.push_scripts(&mut html, ScriptLocation::BodyEnd);
        html.push_str("</body>\n</html>\n");
        html
    }

    fn push_scripts(&self, html: &mut String, location: ScriptLocation) {
        for script in self.resources.scripts_at(location) {
            let _ = writeln!(html, "<script type=\"module\">\n{}\n</script>", script.code);
        }
    }
}

/// Site-relative resource hrefs become page-relative.
fn resolve_href(root: &str, href: &str) -> String {
    if is_external_link(href) || href.starts_with("//") {
        href.to_string()
    } else {
        format!("{root}/{}", href.trim_start_matches('/'))
    }
}
