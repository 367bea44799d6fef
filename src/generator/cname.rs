//! `CNAME` for GitHub Pages style hosting.

use super::{Artifact, Artifacts, EmitContext, Emitter};
use crate::content::DocumentStore;
use crate::log;
use crate::pipeline::Resources;

pub struct Cname;

impl Emitter for Cname {
    fn name(&self) -> &'static str {
        "cname"
    }

    fn emit<'a>(
        &'a self,
        ctx: &'a EmitContext<'a>,
        _store: &'a DocumentStore,
        _resources: &'a Resources,
    ) -> Artifacts<'a> {
        let host = ctx
            .config
            .site
            .parsed_base_url()
            .and_then(|url| url.host_str().map(str::to_string));
        match host {
            Some(host) => Box::new(std::iter::once(Ok(Artifact::bytes("CNAME", None, host)))),
            None => {
                log!("warning"; "cname: `site.base_url` is not set, skipping CNAME");
                Box::new(std::iter::empty())
            }
        }
    }
}
