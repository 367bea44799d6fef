//! Built-in transformers.
//!
//! | Plugin        | Stages        | Provides                               |
//! |---------------|---------------|----------------------------------------|
//! | `frontmatter` | text          | frontmatter, aliases                   |
//! | `dates`       | tree          | dates                                  |
//! | `toc`         | tree          | toc (and heading ids in the tree)      |
//! | `description` | tree          | plain_text, description, reading_time  |
//! | `links`       | tree, render  | links                                  |
//! | `live-reload` | resources     |                                        |

mod dates;
mod description;
mod frontmatter;
mod links;
mod live_reload;
mod toc;

pub use dates::DatesPlugin;
pub use description::DescriptionPlugin;
pub use frontmatter::FrontMatterPlugin;
pub use links::LinksPlugin;
pub use live_reload::LiveReloadPlugin;
pub use toc::TocPlugin;

use super::Transformer;

/// The default plugin list, in execution order.
pub fn default_transformers() -> Vec<Box<dyn Transformer>> {
    vec![
        Box::new(FrontMatterPlugin),
        Box::new(DatesPlugin),
        Box::new(TocPlugin),
        Box::new(DescriptionPlugin),
        Box::new(LinksPlugin),
        Box::new(LiveReloadPlugin),
    ]
}
