//! Transformer capability traits.
//!
//! A transformer implements any subset of four stages. Each stage is an
//! optional accessor on [`Transformer`]; returning `None` means "not
//! implemented" and the pipeline skips the plugin for that stage.
//!
//! ```text
//! text ──▶ (parse) ──▶ tree ──▶ (render) ──▶ render ──▶ resources
//! ```

use crate::config::SiteConfig;
use crate::content::{Document, Field};
use crate::core::slug::Slug;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;

/// The fixed global stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Discover,
    Text,
    Parse,
    Tree,
    Render,
    Resources,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discover => "discover",
            Self::Text => "text",
            Self::Parse => "parse",
            Self::Tree => "tree",
            Self::Render => "render",
            Self::Resources => "resources",
        })
    }
}

/// Read-only data shared by every stage invocation of a pass.
pub struct StageContext<'a> {
    pub config: &'a SiteConfig,
    /// All slugs discovered in this pass.
    pub slugs: &'a BTreeSet<Slug>,
}

/// Which derived fields a stage writes and which it reads.
///
/// Checked once, when the pipeline is assembled.
pub trait Contract {
    fn provides(&self) -> &'static [Field] {
        &[]
    }

    fn requires(&self) -> &'static [Field] {
        &[]
    }
}

/// Pre-parse transform over `Document::text`.
pub trait TextStage: Contract + Send + Sync {
    fn transform_text(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()>;
}

/// Transform over the parsed event tree.
pub trait TreeStage: Contract + Send + Sync {
    fn transform_tree(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()>;
}

/// Transform over the rendered HTML.
pub trait RenderStage: Contract + Send + Sync {
    fn transform_render(&self, ctx: &StageContext<'_>, doc: &mut Document) -> Result<()>;
}

/// Global declaration of stylesheets and scripts. Errors here fail the pass.
pub trait ResourceStage: Send + Sync {
    fn resources(&self, ctx: &StageContext<'_>) -> Result<Resources>;
}

pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn text_stage(&self) -> Option<&dyn TextStage> {
        None
    }

    fn tree_stage(&self) -> Option<&dyn TreeStage> {
        None
    }

    fn render_stage(&self) -> Option<&dyn RenderStage> {
        None
    }

    fn resource_stage(&self) -> Option<&dyn ResourceStage> {
        None
    }
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLocation {
    Head,
    BodyEnd,
}

/// An inline module script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub location: ScriptLocation,
    pub code: String,
}

/// Stylesheets and scripts every page includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    /// Stylesheet hrefs relative to the site root.
    pub css: Vec<String>,
    pub scripts: Vec<Script>,
}

impl Resources {
    pub fn extend(&mut self, other: Resources) {
        self.css.extend(other.css);
        self.scripts.extend(other.scripts);
    }

    pub fn scripts_at(&self, location: ScriptLocation) -> impl Iterator<Item = &Script> {
        self.scripts.iter().filter(move |s| s.location == location)
    }
}
