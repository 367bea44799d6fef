//! Configuration section definitions.
//!
//! | Module    | TOML Section  | Purpose                                |
//! |-----------|---------------|----------------------------------------|
//! | `site`    | `[site]`      | Title, base URL, locale, ignores       |
//! | `build`   | `[build]`     | Content/output/static paths, threads   |
//! | `serve`   | `[serve]`     | Dev server and live reload             |
//! | `plugins` | `[plugins.*]` | Per-transformer and emitter options    |

mod build;
mod plugins;
mod serve;
mod site;

pub use build::BuildSectionConfig;
pub use plugins::{DateSource, DescriptionConfig, PluginsConfig};
pub use serve::{ServeConfig, normalize_base_dir};
pub use site::SiteSectionConfig;
