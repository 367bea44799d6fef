//! Development server with live reload support.
//!
//! Requests are answered from the output directory through the
//! canonicalizing [`route`](route::route). Each request holds the build lock
//! for reading, so nothing is served from a half-written tree.

mod lifecycle;
mod response;
pub mod route;

use crate::{
    build::{BuildLock, Orchestrator},
    config::ConfigHandle,
    log,
};
use anyhow::Result;
use crossbeam::channel;
use percent_encoding::percent_decode_str;
use route::Route;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Method, Request, Server};

/// Number of threads answering requests.
const REQUEST_THREADS: usize = 4;

/// Everything a request handler needs.
struct ServeContext {
    config: Arc<ConfigHandle>,
    lock: BuildLock,
}

/// Serve until Ctrl+C.
///
/// The orchestrator has already finished its first build. With `watch`
/// enabled, config edits recompile through it.
pub fn serve(
    orchestrator: Arc<Orchestrator>,
    config: Arc<ConfigHandle>,
    runtime: Option<&tokio::runtime::Handle>,
) -> Result<()> {
    let current = config.get();
    let (server, addr) = lifecycle::bind_with_retry(current.serve.interface, current.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server_for_shutdown(Arc::clone(&server), shutdown_tx);

    let config_watch = match runtime {
        Some(runtime) if current.serve.watch => Some(lifecycle::watch_config(runtime, &orchestrator)?),
        _ => None,
    };
    let listener =
        lifecycle::spawn_shutdown_listener(shutdown_rx, config_watch, Arc::clone(&orchestrator));

    log!("serve"; "http://{}{}/", addr, current.serve.base_dir);

    let ctx = Arc::new(ServeContext {
        config,
        lock: Arc::clone(orchestrator.lock()),
    });
    run_request_loop(&server, &ctx)?;

    lifecycle::wait_for_shutdown(listener);
    Ok(())
}

fn run_request_loop(server: &Server, ctx: &Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("serve-{i}"))
        .build()?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    let path = request_path(request.url());
    ctx.answer(&path, |output, answer| match answer {
        Answer::File(file) => {
            log!("serve"; "[200] {}", path);
            response::respond_file(request, &file)
        }
        Answer::Redirect(location) => {
            log!("serve"; "[302] {} -> {}", path, location);
            response::respond_redirect(request, &location)
        }
        Answer::NotFound => {
            log!("serve"; "[404] {}", path);
            response::respond_not_found(request, output)
        }
    })
}

/// Where a request ends up.
#[derive(Debug, PartialEq, Eq)]
enum Answer {
    File(PathBuf),
    Redirect(String),
    NotFound,
}

impl ServeContext {
    /// Route `path` and run `respond` with the build lock held for reading.
    ///
    /// A running build holds the lock for writing, so this waits for it to
    /// finish. The guard lives until `respond` returns: redirects and 404s
    /// are decided against the same tree the body is read from.
    fn answer<R>(&self, path: &str, respond: impl FnOnce(&Path, Answer) -> R) -> R {
        let _guard = self.lock.read();
        let config = self.config.get();
        let output = config.output_dir();

        let answer = match route::route(path, &config.serve.base_dir, output) {
            Route::Serve { file } => Answer::File(output.join(file)),
            Route::Redirect { location } => Answer::Redirect(location),
            Route::Delegate { path: rel } => {
                response::resolve_delegate(output, &rel).map_or(Answer::NotFound, Answer::File)
            }
            Route::NotFound => Answer::NotFound,
        };
        respond(output, answer)
    }
}

/// Decoded path of a request URL, query and fragment dropped.
fn request_path(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let raw = &url[..end];
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        format!("/{decoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::new_lock;
    use crate::config::{CONFIG_FILE, Overrides};
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn context() -> (TempDir, ServeContext) {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "[site]\ntitle = \"Test\"\n").unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("docs")).unwrap();
        fs::write(public.join("about.html"), "old").unwrap();
        fs::write(public.join("docs/index.html"), "docs").unwrap();

        let config = Arc::new(ConfigHandle::load(&config_path, Overrides::default()).unwrap());
        (dir, ServeContext { config, lock: new_lock() })
    }

    #[test]
    fn test_answer_follows_routing() {
        let (_dir, ctx) = context();
        let output = ctx.config.get().output_dir().to_path_buf();

        let answer = |path: &str| ctx.answer(path, |_, answer| answer);
        assert_eq!(answer("/about"), Answer::File(output.join("about.html")));
        assert_eq!(answer("/about/"), Answer::Redirect("/about".into()));
        assert_eq!(answer("/docs"), Answer::Redirect("/docs/".into()));
        assert_eq!(answer("/docs/index.html"), Answer::File(output.join("docs/index.html")));
        assert_eq!(answer("/missing"), Answer::NotFound);
    }

    #[test]
    fn test_request_waits_for_running_build() {
        let (_dir, ctx) = context();
        let ctx = Arc::new(ctx);
        let about = ctx.config.get().output_dir().join("about.html");
        let answered = Arc::new(AtomicBool::new(false));

        let build = ctx.lock.write();
        let request = {
            let ctx = Arc::clone(&ctx);
            let answered = Arc::clone(&answered);
            thread::spawn(move || {
                ctx.answer("/about", |_, answer| {
                    answered.store(true, Ordering::SeqCst);
                    match answer {
                        Answer::File(file) => fs::read_to_string(file).unwrap(),
                        other => panic!("unexpected {other:?}"),
                    }
                })
            })
        };

        thread::sleep(Duration::from_millis(150));
        assert!(!answered.load(Ordering::SeqCst), "answered while a build held the lock");
        fs::write(&about, "new").unwrap();
        drop(build);

        assert_eq!(request.join().unwrap(), "new");
        assert!(answered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("/about?x=1"), "/about");
        assert_eq!(request_path("/notes/My%20Note#top"), "/notes/My Note");
        assert_eq!(request_path("/"), "/");
        assert_eq!(request_path(""), "/");
        assert_eq!(request_path("/caf%C3%A9/"), "/café/");
    }
}
