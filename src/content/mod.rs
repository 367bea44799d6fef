//! Source documents: discovery, identity and derived fields.

mod document;
mod ignore;
mod store;

pub use document::{
    Dates, Document, Field, FrontMatter, ReadingTime, TocEntry, Tree,
};
pub use ignore::{IgnoreSet, is_markdown, walk_files};
pub use store::{DocumentStore, Rejected};

#[cfg(test)]
pub use document::test_document;
