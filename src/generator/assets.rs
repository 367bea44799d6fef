//! Verbatim copies: non-Markdown content files and the static directory.

use super::{Artifact, Artifacts, EmitContext, Emitter};
use crate::content::{DocumentStore, IgnoreSet, is_markdown, walk_files};
use crate::core::slug::slugify_file_path;
use crate::pipeline::Resources;
use std::path::PathBuf;

/// Content-directory files that are not documents (images, PDFs, ...),
/// copied to their slugified paths.
pub struct Assets;

impl Emitter for Assets {
    fn name(&self) -> &'static str {
        "assets"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        _store: &'a DocumentStore,
        _resources: &'a Resources,
    ) -> Artifacts<'a> {
        let ignore = match IgnoreSet::new(&ctx.config.site.ignore_patterns) {
            Ok(ignore) => ignore,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        let files = walk_files(ctx.config.content_dir(), &ignore);
        Box::new(
            files
                .into_iter()
                .filter(|(_, rel)| !is_markdown(rel))
                .map(|(full, rel)| Ok(Artifact::copy(slugify_file_path(&rel), full))),
        )
    }
}

/// Everything under `build.static_dir`, copied to `static/`.
pub struct Static;

impl Emitter for Static {
    fn name(&self) -> &'static str {
        "static"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        _store: &'a DocumentStore,
        _resources: &'a Resources,
    ) -> Artifacts<'a> {
        let files = walk_files(ctx.config.static_dir(), &IgnoreSet::default());
        Box::new(
            files
                .into_iter()
                .map(|(full, rel)| Ok(Artifact::copy(PathBuf::from("static").join(rel), full))),
        )
    }
}
