//! Document transformation pipeline.
//!
//! # Ordering
//!
//! Stages run in a fixed global order, and within a stage the plugins run in
//! list order. Each plugin's stage finishes over *every* document before the
//! next plugin's stage starts:
//!
//! ```text
//! for stage in [text, parse, tree, render]:
//!     for plugin in plugins:          # list order
//!         par_for doc in healthy(store):
//!             plugin.stage(doc)
//! resources = concat(plugin.resources() for plugin in plugins)
//! ```
//!
//! So a plugin may rely on fields produced by earlier plugins for all
//! documents, not just the one it is visiting. The ordering is checked once
//! in [`Pipeline::new`] against each stage's [`Contract`].
//!
//! # Failure isolation
//!
//! An error or panic in a per-document stage is recorded against that
//! document in the [`PassReport`], and the document is skipped from then on.
//! An error in a resource declaration fails the whole pass.

mod plugin;
mod report;
pub mod transform;

pub use plugin::{
    Contract, RenderStage, ResourceStage, Resources, Script, ScriptLocation, Stage,
    StageContext, TextStage, Transformer, TreeStage,
};
pub use report::{Failure, PassReport};

use crate::content::{Document, DocumentStore, Field};
use anyhow::{Context, Result, anyhow};
use pulldown_cmark::{Options, Parser, html};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Rejected plugin orderings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("`{plugin}` ({stage} stage) requires `{field}`, but no earlier stage provides it")]
    MissingDependency {
        plugin: &'static str,
        stage: Stage,
        field: Field,
    },

    #[error("`{field}` is provided by both `{first}` and `{second}`")]
    DuplicateProvider {
        field: Field,
        first: &'static str,
        second: &'static str,
    },
}

/// Name recorded as the writer of built-in fields.
const PARSE: &str = "parse";
const RENDER: &str = "render";

/// An ordered, validated list of transformers.
pub struct Pipeline {
    plugins: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    /// Assemble and validate the plugin order.
    pub fn new(plugins: Vec<Box<dyn Transformer>>) -> Result<Self, PipelineError> {
        validate_order(&plugins)?;
        Ok(Self { plugins })
    }

    /// Run every stage over `store`.
    ///
    /// Per-document failures land in `report`; the returned error is reserved
    /// for failures of the pass itself (resource declaration).
    pub fn run(
        &self,
        store: &mut DocumentStore,
        ctx: &StageContext<'_>,
        report: &mut PassReport,
    ) -> Result<Resources> {
        for plugin in &self.plugins {
            if let Some(stage) = plugin.text_stage() {
                each_document(store, report, plugin.name(), Stage::Text, |doc| {
                    stage.transform_text(ctx, doc)
                });
            }
        }

        each_document(store, report, PARSE, Stage::Parse, parse_document);

        for plugin in &self.plugins {
            if let Some(stage) = plugin.tree_stage() {
                each_document(store, report, plugin.name(), Stage::Tree, |doc| {
                    stage.transform_tree(ctx, doc)
                });
            }
        }

        each_document(store, report, RENDER, Stage::Render, render_document);

        for plugin in &self.plugins {
            if let Some(stage) = plugin.render_stage() {
                each_document(store, report, plugin.name(), Stage::Render, |doc| {
                    stage.transform_render(ctx, doc)
                });
            }
        }

        let mut resources = Resources::default();
        for plugin in &self.plugins {
            if let Some(stage) = plugin.resource_stage() {
                let declared = stage
                    .resources(ctx)
                    .with_context(|| format!("`{}` failed in the {} stage", plugin.name(), Stage::Resources))?;
                resources.extend(declared);
            }
        }

        Ok(resources)
    }
}

/// Check that every requirement is provided by an earlier stage, and that no
/// field has two producers.
fn validate_order(plugins: &[Box<dyn Transformer>]) -> Result<(), PipelineError> {
    let mut providers: BTreeMap<Field, &'static str> = BTreeMap::new();

    let mut visit = |plugin: &'static str,
                     stage: Stage,
                     requires: &[Field],
                     provides: &[Field]| {
        for &field in requires {
            if !providers.contains_key(&field) {
                return Err(PipelineError::MissingDependency {
                    plugin,
                    stage,
                    field,
                });
            }
        }
        for &field in provides {
            if let Some(&first) = providers.get(&field) {
                return Err(PipelineError::DuplicateProvider {
                    field,
                    first,
                    second: plugin,
                });
            }
            providers.insert(field, plugin);
        }
        Ok(())
    };

    for p in plugins {
        if let Some(s) = p.text_stage() {
            visit(p.name(), Stage::Text, s.requires(), s.provides())?;
        }
    }
    visit(PARSE, Stage::Parse, &[], &[Field::Tree])?;
    for p in plugins {
        if let Some(s) = p.tree_stage() {
            visit(p.name(), Stage::Tree, s.requires(), s.provides())?;
        }
    }
    visit(RENDER, Stage::Render, &[Field::Tree], &[Field::Rendered])?;
    for p in plugins {
        if let Some(s) = p.render_stage() {
            visit(p.name(), Stage::Render, s.requires(), s.provides())?;
        }
    }
    Ok(())
}

/// Apply `f` to every healthy document in parallel, recording failures.
fn each_document<F>(
    store: &mut DocumentStore,
    report: &mut PassReport,
    plugin: &'static str,
    stage: Stage,
    f: F,
) where
    F: Fn(&mut Document) -> Result<()> + Sync,
{
    let failed = report.failed();
    let failures: Vec<Failure> = store
        .docs_mut()
        .par_iter_mut()
        .filter(|(slug, _)| !failed.contains(*slug))
        .filter_map(|(slug, doc)| {
            let outcome = catch_unwind(AssertUnwindSafe(|| f(doc)))
                .unwrap_or_else(|panic| Err(anyhow!("panicked: {}", panic_message(panic.as_ref()))));
            outcome.err().map(|e| Failure {
                slug: Some(slug.clone()),
                source: doc.source.clone(),
                plugin,
                stage,
                message: format!("{e:#}"),
            })
        })
        .collect();

    for failure in failures {
        report.record(failure);
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

fn parse_document(doc: &mut Document) -> Result<()> {
    let tree = Parser::new_ext(&doc.text, markdown_options())
        .map(|event| event.into_static())
        .collect();
    doc.tree.set(PARSE, tree)?;
    Ok(())
}

fn render_document(doc: &mut Document) -> Result<()> {
    let tree = doc.tree.require(RENDER)?;
    let mut out = String::with_capacity(doc.text.len() * 3 / 2);
    html::push_html(&mut out, tree.iter().cloned());
    doc.rendered.set(RENDER, out)?;
    Ok(())
}
