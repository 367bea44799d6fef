use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::sync::mpsc;

use super::debouncer::{DEBOUNCE_MS, Debouncer, REBUILD_COOLDOWN_MS, is_temp_file, reconcile};
use super::*;

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn kind_of(debouncer: &Debouncer, path: &str) -> Option<ChangeKind> {
    debouncer.changes.get(Path::new(path))
}

#[test]
fn test_debouncer_empty() {
    let mut debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_event_routing_by_kind() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/a.md"], create_kind()));
    debouncer.add_event(&make_event(vec!["/site/b.md"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/site/c.md"], remove_kind()));

    assert_eq!(debouncer.changes.len(), 3);
    assert_eq!(kind_of(&debouncer, "/site/a.md"), Some(ChangeKind::Created));
    assert_eq!(kind_of(&debouncer, "/site/b.md"), Some(ChangeKind::Modified));
    assert_eq!(kind_of(&debouncer, "/site/c.md"), Some(ChangeKind::Removed));
}

#[test]
fn test_metadata_changes_ignored() {
    let mut debouncer = Debouncer::new();
    let kind = notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ));
    debouncer.add_event(&make_event(vec!["/site/a.md"], kind));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_temp_file_ignored() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/real.md"], modify_kind()));
    let first_time = debouncer.last_event.unwrap();

    std::thread::sleep(Duration::from_millis(5));

    debouncer.add_event(&make_event(vec!["/site/.real.md.swp"], modify_kind()));
    assert_eq!(debouncer.last_event.unwrap(), first_time);
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_temp_file_patterns() {
    assert!(is_temp_file(Path::new("notes/a.md~")));
    assert!(is_temp_file(Path::new("notes/a.md.bak")));
    assert!(is_temp_file(Path::new("notes/.#a.md")));
    assert!(!is_temp_file(Path::new("notes/a.md")));
}

#[test]
fn test_dedup_first_event_wins() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/a.md"], create_kind()));
    debouncer.add_event(&make_event(vec!["/site/a.md"], modify_kind()));

    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(kind_of(&debouncer, "/site/a.md"), Some(ChangeKind::Created));
}

#[test]
fn test_remove_then_create_is_modification() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/a.md"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/site/a.md"], create_kind()));
    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(kind_of(&debouncer, "/site/a.md"), Some(ChangeKind::Modified));
}

#[test]
fn test_create_then_remove_discards() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/a.md"], create_kind()));
    debouncer.add_event(&make_event(vec!["/site/a.md"], remove_kind()));
    assert!(debouncer.changes.is_empty(), "created+removed should discard");
}

#[test]
fn test_modify_then_remove_upgrades() {
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(vec!["/site/a.md"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/site/a.md"], remove_kind()));
    assert_eq!(kind_of(&debouncer, "/site/a.md"), Some(ChangeKind::Removed));
}

#[test]
fn test_sleep_duration_no_events() {
    let debouncer = Debouncer::new();
    assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
}

#[test]
fn test_sleep_duration_after_event() {
    let mut debouncer = Debouncer::new();
    debouncer.last_event = Some(Instant::now());

    let dur = debouncer.sleep_duration();
    assert!(dur >= Duration::from_millis(DEBOUNCE_MS - 10));
    assert!(dur <= Duration::from_millis(DEBOUNCE_MS + 10));
}

#[test]
fn test_sleep_duration_respects_cooldown() {
    let mut debouncer = Debouncer::new();
    debouncer.last_event = Some(Instant::now());
    debouncer.last_flush = Some(Instant::now());

    let dur = debouncer.sleep_duration();
    assert!(dur >= Duration::from_millis(REBUILD_COOLDOWN_MS - 10));
    assert!(dur <= Duration::from_millis(REBUILD_COOLDOWN_MS + 10));
}

#[test]
fn test_take_after_debounce_window() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.md");
    std::fs::write(&file, "x").unwrap();

    let mut debouncer = Debouncer::new();
    debouncer.changes.record(file.clone(), ChangeKind::Modified);
    debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS + 1));

    let changes = debouncer.take_if_ready().unwrap();
    assert_eq!(changes.get(&file), Some(ChangeKind::Modified));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_flush.is_some());
}

#[test]
fn test_reconcile_with_disk() {
    let dir = TempDir::new().unwrap();
    let kept = dir.path().join("kept.md");
    std::fs::write(&kept, "x").unwrap();
    let gone = dir.path().join("gone.md");
    let flash = dir.path().join("flash.md");

    let changes: ChangeSet = [
        (kept.clone(), ChangeKind::Removed),
        (gone.clone(), ChangeKind::Modified),
        (flash.clone(), ChangeKind::Created),
    ]
    .into_iter()
    .collect();

    let fixed = reconcile(changes);
    assert_eq!(fixed.get(&kept), Some(ChangeKind::Modified));
    assert_eq!(fixed.get(&gone), Some(ChangeKind::Removed));
    assert_eq!(fixed.get(&flash), None);
}

#[test]
fn test_change_set_merge_across_bursts() {
    let mut first: ChangeSet = [
        (PathBuf::from("/s/a.md"), ChangeKind::Modified),
        (PathBuf::from("/s/b.md"), ChangeKind::Created),
    ]
    .into_iter()
    .collect();
    let second: ChangeSet = [
        (PathBuf::from("/s/b.md"), ChangeKind::Removed),
        (PathBuf::from("/s/c.md"), ChangeKind::Modified),
    ]
    .into_iter()
    .collect();

    first.merge(second);
    let merged: Vec<_> = first.iter().map(|(p, k)| (p.to_path_buf(), k)).collect();
    assert_eq!(
        merged,
        vec![
            (PathBuf::from("/s/a.md"), ChangeKind::Modified),
            (PathBuf::from("/s/c.md"), ChangeKind::Modified),
        ]
    );
    assert!(first.only_modified(|p| p.extension().is_some_and(|e| e == "md")));
    assert!(!first.only_modified(|p| p.ends_with("a.md")));
    assert!(!ChangeSet::new().only_modified(|_| true));
}

#[test]
fn test_describe() {
    let one: ChangeSet = [(PathBuf::from("/s/a.md"), ChangeKind::Removed)].into_iter().collect();
    assert_eq!(one.describe(), "removed: /s/a.md");

    let mut two = one.clone();
    two.record(PathBuf::from("/s/b.md"), ChangeKind::Created);
    assert_eq!(two.describe(), "2 files changed");
}

#[tokio::test]
async fn test_actor_posts_filtered_changes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("keep.md"), "a").unwrap();
    std::fs::write(root.join("skip.txt"), "a").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let filter: WatchFilter = Box::new(|p: &Path| p.extension().is_some_and(|e| e == "md"));
    let actor = FsActor::new("watch", &[WatchTarget::tree(&root)], filter, tx).unwrap();
    let task = tokio::spawn(actor.run());

    // let the platform watcher settle before touching files
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(root.join("keep.md"), "b").unwrap();
    std::fs::write(root.join("skip.txt"), "b").unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no change set within 5s")
        .unwrap();
    let BuildMsg::Rebuild(changes) = msg else {
        panic!("expected a rebuild");
    };
    assert!(changes.get(&root.join("keep.md")).is_some());
    assert!(changes.get(&root.join("skip.txt")).is_none());

    task.abort();
}
