//! Dev-server reload script (resource stage).
//!
//! Declares nothing outside `serve`. While serving, every page gets a small
//! script that opens the reload socket and refreshes on any message.

use crate::pipeline::{ResourceStage, Resources, Script, ScriptLocation, StageContext, Transformer};
use anyhow::{Result, bail};

pub struct LiveReloadPlugin;

impl Transformer for LiveReloadPlugin {
    fn name(&self) -> &'static str {
        "live-reload"
    }

    fn resource_stage(&self) -> Option<&dyn ResourceStage> {
        Some(self)
    }
}

impl ResourceStage for LiveReloadPlugin {
    fn resources(&self, ctx: &StageContext<'_>) -> Result<Resources> {
        if !ctx.config.serving {
            return Ok(Resources::default());
        }
        let address = ctx.config.ws_address();
        if address.contains(['"', '\'', '<', '>', '\\']) {
            bail!("invalid reload socket address `{address}`");
        }
        Ok(Resources {
            css: Vec::new(),
            scripts: vec![Script {
                location: ScriptLocation::BodyEnd,
                code: reload_script(&address),
            }],
        })
    }
}

fn reload_script(address: &str) -> String {
    format!(
        "const socket = new WebSocket(\"ws://{address}\");\n\
         socket.addEventListener(\"message\", () => document.location.reload());"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::collections::BTreeSet;

    fn declare(config: &SiteConfig) -> Result<Resources> {
        let slugs = BTreeSet::new();
        LiveReloadPlugin.resources(&StageContext { config, slugs: &slugs })
    }

    #[test]
    fn test_nothing_outside_serve() {
        assert_eq!(declare(&SiteConfig::default()).unwrap(), Resources::default());
    }

    #[test]
    fn test_script_while_serving() {
        let mut config = SiteConfig::default();
        config.serving = true;
        let resources = declare(&config).unwrap();
        let [script] = resources.scripts.as_slice() else {
            panic!("expected one script");
        };
        assert_eq!(script.location, ScriptLocation::BodyEnd);
        assert!(script.code.contains("ws://127.0.0.1:3001"));
    }

    #[test]
    fn test_hostile_host_is_rejected() {
        let mut config = SiteConfig::default();
        config.serving = true;
        config.serve.ws_host = Some("x\"</script>".into());
        assert!(declare(&config).is_err());
    }
}
