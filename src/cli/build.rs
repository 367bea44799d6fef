//! The `build` command, and `serve` on top of it.
//!
//! ```text
//! find quire.toml ─▶ [reload socket] ─▶ ConfigHandle ─▶ Orchestrator
//!                                                          │ first build (fatal on error)
//!                                                          ▼
//!                                        single shot: done │ serve: HTTP loop + watchers
//! ```

use super::{Cli, serve};
use crate::{
    build::{BuildStatus, Notifier, Orchestrator, SiteCompiler},
    config::{ConfigHandle, Overrides, SiteConfig, find_config_file},
    debug, log,
    reload::{LiveReloadChannel, WsConnection, start_reload_server},
    utils::plural_s,
};
use anyhow::{Result, bail};
use std::sync::Arc;

/// Run `build` (or `serve`) to completion.
pub fn run(cli: &Cli) -> Result<()> {
    let config_path = find_config_file(&cli.config)?;
    let serving = cli.is_serving();
    let mut overrides = overrides_from(cli);

    let channel: Arc<LiveReloadChannel<WsConnection>> = Arc::new(LiveReloadChannel::new());
    if serving {
        // the reload port may move on retry; pages must embed the final one
        let preliminary = SiteConfig::load(&config_path, &overrides)?;
        let ws_port = start_reload_server(
            preliminary.serve.interface,
            preliminary.serve.ws_port,
            Arc::clone(&channel),
        )?;
        debug!("reload"; "ws://{}:{}", preliminary.serve.interface, ws_port);
        overrides.ws_port = Some(ws_port);
    }

    let handle = Arc::new(ConfigHandle::load(&config_path, overrides)?);
    let config = handle.get();
    let runtime = if serving && config.serve.watch {
        Some(
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()?,
        )
    } else {
        None
    };

    let notifier = {
        let channel = Arc::clone(&channel);
        Notifier::new(move || {
            let sent = channel.broadcast();
            debug!("reload"; "notified {} client{}", sent, plural_s(sent));
        })
    };
    let mut orchestrator =
        Orchestrator::new(&config_path, Box::new(SiteCompiler::new(Arc::clone(&handle))))
            .with_notifier(notifier);
    if let Some(runtime) = &runtime {
        orchestrator = orchestrator.with_runtime(runtime.handle().clone());
    }
    let orchestrator = Arc::new(orchestrator);

    log!("build"; "{}", config.root_relative(config.content_dir()).display());
    let status = orchestrator.request_build("initial build")?;

    if !serving {
        return match status {
            BuildStatus::Degraded(n) => bail!("{n} document{} failed", plural_s(n)),
            _ => Ok(()),
        };
    }

    serve::serve(
        Arc::clone(&orchestrator),
        handle,
        runtime.as_ref().map(tokio::runtime::Runtime::handle),
    )?;

    orchestrator.shutdown();
    if let Some(runtime) = runtime {
        runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    }
    Ok(())
}

/// Command-line values that override `quire.toml`.
fn overrides_from(cli: &Cli) -> Overrides {
    let args = cli.build_args();
    Overrides {
        content: args.directory.clone(),
        output: args.output.clone(),
        concurrency: args.concurrency,
        serving: cli.is_serving(),
        watch: cli.watch(),
        interface: args.interface,
        port: args.port,
        ws_port: args.ws_port,
        base_dir: args.base_dir.clone(),
        ws_host: args.ws_host.clone(),
    }
}
