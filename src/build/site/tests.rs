use super::*;
use crate::actor::fs::ChangeKind;
use crate::build::{BuildStatus, Orchestrator, new_lock};
use crate::config::{CONFIG_FILE, Overrides};
use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::AtomicUsize;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    handle: Arc<ConfigHandle>,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[site]\ntitle = \"Test\"\nbase_url = \"example.com\"\n",
        )
        .unwrap();
        for (rel, body) in files {
            let path = dir.path().join("content").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let handle =
            Arc::new(ConfigHandle::load(&dir.path().join(CONFIG_FILE), Overrides::default()).unwrap());
        Self { dir, handle }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.handle.path(), Box::new(SiteCompiler::new(Arc::clone(&self.handle))))
    }

    fn content(&self, rel: &str) -> PathBuf {
        self.dir.path().join("content").join(rel)
    }

    fn public(&self, rel: &str) -> PathBuf {
        self.dir.path().join("public").join(rel)
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.public(rel)).unwrap()
    }

    /// Every file under the output dir with its bytes.
    fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let root = self.dir.path().join("public");
        jwalk::WalkDir::new(&root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let path = e.path();
                let bytes = fs::read(&path).unwrap();
                (path.strip_prefix(&root).unwrap().to_path_buf(), bytes)
            })
            .collect()
    }
}

const INDEX: &str = "---\ntitle: Home\n---\n# Welcome\n\nSee [a](notes/a.md).";
const NOTE: &str = "---\ntitle: Note A\ndate: 2024-02-01\n---\nBody.";

#[test]
fn test_single_shot_build() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let orch = site.orchestrator();

    assert_eq!(orch.request_build("initial").unwrap(), BuildStatus::Built);
    assert!(site.read("index.html").contains("<title>Home | Test</title>"));
    assert!(site.read("notes/a.html").contains("<p>Body.</p>"));
    assert!(site.public("sitemap.xml").is_file());

    let output = orch.output().unwrap();
    assert!(output.contains(Path::new("notes/a.html")));
    assert_eq!(output.owner(Path::new("notes/a.html")), Some(&Slug::new("notes/a")));
}

#[test]
fn test_broken_document_degrades_build() {
    let site = Fixture::new(&[("index.md", INDEX), ("bad.md", "---\ntitle: [\n---\n")]);
    let orch = site.orchestrator();

    assert_eq!(orch.request_build("initial").unwrap(), BuildStatus::Degraded(1));
    assert!(site.public("index.html").is_file());
    assert!(!site.public("bad.html").exists());
}

#[test]
fn test_failing_rebuild_leaves_output_identical() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let orch = site.orchestrator();
    orch.request_build("initial").unwrap();
    let before = site.snapshot();

    fs::write(site.handle.path(), "[site\ntitle = ").unwrap();
    fs::write(site.content("notes/a.md"), "---\ntitle: Changed\n---\nNew body.").unwrap();
    assert_eq!(orch.request_build("config changed").unwrap(), BuildStatus::Failed);

    assert_eq!(site.snapshot(), before);
}

#[test]
fn test_recompile_applies_new_config() {
    let site = Fixture::new(&[("index.md", INDEX)]);
    let orch = site.orchestrator();
    orch.request_build("initial").unwrap();

    fs::write(site.handle.path(), "[site]\ntitle = \"Renamed\"\n").unwrap();
    assert_eq!(orch.request_build("config changed").unwrap(), BuildStatus::Built);
    assert!(site.read("index.html").contains("<title>Home | Renamed</title>"));
    // no base_url any more
    assert!(!site.public("sitemap.xml").exists());
    assert!(!site.public("CNAME").exists());
}

#[test]
fn test_removed_document_is_cleaned_up() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let orch = site.orchestrator();
    orch.request_build("initial").unwrap();
    assert!(site.public("notes/a.html").is_file());

    fs::remove_file(site.content("notes/a.md")).unwrap();
    orch.request_build("removed").unwrap();
    assert!(!site.public("notes/a.html").exists());
    assert!(!site.public("notes").exists());
}

#[test]
fn test_failed_document_keeps_last_good_page() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let orch = site.orchestrator();
    orch.request_build("initial").unwrap();
    let good = site.read("notes/a.html");

    fs::write(site.content("notes/a.md"), "---\ntitle: [\n---\nBroken.").unwrap();
    assert_eq!(orch.request_build("edit").unwrap(), BuildStatus::Degraded(1));
    assert_eq!(site.read("notes/a.html"), good);
}

#[test]
fn test_unreadable_document_keeps_last_good_page() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let orch = site.orchestrator();
    orch.request_build("initial").unwrap();
    let good = site.read("notes/a.html");

    fs::write(site.content("notes/a.md"), [0xffu8, 0xfe, b'x']).unwrap();
    assert_eq!(orch.request_build("edit").unwrap(), BuildStatus::Degraded(1));
    assert_eq!(site.read("notes/a.html"), good);
    assert!(orch.output().unwrap().contains(Path::new("notes/a.html")));
}

fn rebuilder(site: &Fixture) -> (ContentRebuilder, Arc<AtomicUsize>) {
    let program = SiteProgram::new(site.handle.get()).unwrap();
    let output = SharedOutput::default();
    let first = program.site.pass(None, None).unwrap();
    *output.lock() = Some(first.output);

    let notified = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&notified);
    let rebuilder = ContentRebuilder {
        site: Arc::clone(&program.site),
        generation: crate::build::program::ProgramArena::new().load(Arc::new(program)),
        lock: new_lock(),
        notify: Notifier::new(move || {
            n.fetch_add(1, Ordering::SeqCst);
        }),
        output,
        cancelled: Arc::new(AtomicBool::new(false)),
    };
    (rebuilder, notified)
}

fn modified(path: PathBuf) -> ChangeSet {
    [(normalize_path(&path), ChangeKind::Modified)].into_iter().collect()
}

#[test]
fn test_content_rebuild_updates_page_and_notifies() {
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", NOTE)]);
    let (rebuilder, notified) = rebuilder(&site);

    fs::write(site.content("notes/a.md"), "---\ntitle: Note A\n---\nSecond draft.").unwrap();
    let outcome = rebuilder.rebuild(&modified(site.content("notes/a.md")));

    assert_eq!(outcome, RebuildOutcome::Done);
    assert!(site.read("notes/a.html").contains("Second draft."));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(rebuilder.output.lock().as_ref().unwrap().contains(Path::new("index.html")));
}

#[test]
fn test_content_rebuild_unpublishes_new_draft() {
    let note = "---\ntitle: Note A\naliases: [old-a]\n---\nBody.";
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", note)]);
    let (rebuilder, _) = rebuilder(&site);
    assert!(site.public("notes/a.html").is_file());
    assert!(site.public("old-a.html").is_file());

    fs::write(site.content("notes/a.md"), "---\ntitle: Note A\ndraft: true\n---\nSecret.").unwrap();
    rebuilder.rebuild(&modified(site.content("notes/a.md")));

    assert!(!site.public("notes/a.html").exists());
    assert!(!site.public("old-a.html").exists());
    let output = rebuilder.output.lock().clone().unwrap();
    assert!(!output.contains(Path::new("notes/a.html")));
    assert!(!output.contains(Path::new("old-a.html")));
    assert!(output.contains(Path::new("index.html")));
    assert!(!site.read("sitemap.xml").contains("notes/a"));
}

#[test]
fn test_content_rebuild_drops_removed_alias() {
    let note = "---\ntitle: Note A\naliases: [old-a]\n---\nBody.";
    let site = Fixture::new(&[("index.md", INDEX), ("notes/a.md", note)]);
    let (rebuilder, _) = rebuilder(&site);

    fs::write(site.content("notes/a.md"), NOTE).unwrap();
    rebuilder.rebuild(&modified(site.content("notes/a.md")));

    assert!(site.public("notes/a.html").is_file());
    assert!(!site.public("old-a.html").exists());
}

#[test]
fn test_retired_rebuilder_does_nothing() {
    let site = Fixture::new(&[("notes/a.md", NOTE)]);
    let (rebuilder, notified) = rebuilder(&site);
    rebuilder.cancelled.store(true, Ordering::SeqCst);

    fs::write(site.content("notes/a.md"), "---\ntitle: Note A\n---\nIgnored.").unwrap();
    rebuilder.rebuild(&modified(site.content("notes/a.md")));

    assert!(site.read("notes/a.html").contains("Body."));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[test]
fn test_partial_only_for_markdown_edits() {
    let site = Fixture::new(&[("notes/a.md", NOTE), ("img/x.png", "png")]);
    let program = SiteProgram::new(site.handle.get()).unwrap();
    let s = &program.site;

    let edit = modified(site.content("notes/a.md"));
    assert_eq!(s.partial_slugs(&edit), Some(BTreeSet::from([Slug::new("notes/a")])));

    let asset = modified(site.content("img/x.png"));
    assert_eq!(s.partial_slugs(&asset), None);

    let mut created = edit.clone();
    created.record(normalize_path(&site.content("notes/b.md")), ChangeKind::Created);
    assert_eq!(s.partial_slugs(&created), None);
}

#[test]
fn test_watch_filter_skips_ignored_content() {
    let site = Fixture::new(&[("notes/a.md", NOTE), ("private/x.md", "x")]);
    fs::create_dir_all(site.dir.path().join("static")).unwrap();
    let program = SiteProgram::new(site.handle.get()).unwrap();
    let filter = program.site.watch_filter();

    assert!(filter(&normalize_path(&site.content("notes/a.md"))));
    assert!(!filter(&normalize_path(&site.content("private/x.md"))));
    assert!(filter(&normalize_path(&site.dir.path().join("static")).join("site.css")));
    assert!(!filter(&normalize_path(site.dir.path()).join("README.md")));
}
