//! Small shared helpers.

pub mod date;
pub mod hash;
pub mod html;
pub mod link;
pub mod mime;
pub mod path;

/// Return "s" suffix for plural counts.
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
