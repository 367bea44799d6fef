//! Redirect pages for front matter aliases.

use super::{Artifact, Artifacts, EmitContext, Emitter};
use crate::content::DocumentStore;
use crate::core::slug::Slug;
use crate::log;
use crate::pipeline::Resources;
use crate::utils::html::escape;

pub struct AliasRedirects;

impl Emitter for AliasRedirects {
    fn name(&self) -> &'static str {
        "alias-redirects"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        store: &'a DocumentStore,
        _resources: &'a Resources,
    ) -> Artifacts<'a> {
        let iter = ctx.published(store).flat_map(move |doc| {
            let aliases = doc.aliases.get().map(Vec::as_slice).unwrap_or_default();
            aliases.iter().filter_map(move |alias| {
                if alias == &doc.slug {
                    return None;
                }
                if store.contains(alias) {
                    log!("warning"; "{}: alias `{alias}` shadows an existing page, skipped", doc.source.display());
                    return None;
                }
                Some(Ok(Artifact::bytes(
                    alias.html_path(),
                    Some(doc.slug.clone()),
                    redirect_page(alias, &doc.slug),
                )))
            })
        });
        Box::new(iter)
    }
}

/// Meta-refresh page at `from` pointing at `to`.
fn redirect_page(from: &Slug, to: &Slug) -> String {
    let href = from.relative_to(to);
    let href = escape(&href);
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en-us\">\n\
         <head>\n\
         <title>{to}</title>\n\
         <link rel=\"canonical\" href=\"{href}\">\n\
         <meta name=\"robots\" content=\"noindex\">\n\
         <meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"0; url={href}\">\n\
         </head>\n\
         </html>\n",
        to = escape(to.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_points_relative() {
        let page = redirect_page(&Slug::new("old/path"), &Slug::new("new"));
        assert!(page.contains(r#"<meta http-equiv="refresh" content="0; url=../new">"#));
        assert!(page.contains(r#"<link rel="canonical" href="../new">"#));
    }
}
