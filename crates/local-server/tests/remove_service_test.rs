use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mangashelf_local_server::{
    ChaptersRemoveService, LocalError, LocalManga, LocalMangaRepository, LocalResult,
    LocalStorageChanges, Manga, MangaChapter,
    notifications::{Notification, NotificationKind, Notifier},
};
use pretty_assertions::assert_eq;
use tokio::sync::{
    Semaphore,
    broadcast::{self, error::TryRecvError},
};

fn sample_manga() -> Manga {
    Manga {
        id: 42,
        title: "Yotsuba&!".to_string(),
        url: "yotsuba".to_string(),
        source: "local".to_string(),
        chapters: None,
    }
}

fn with_chapters(manga: &Manga) -> Manga {
    Manga {
        chapters: Some(
            (1..=3)
                .map(|i| MangaChapter {
                    id: i,
                    name: format!("Chapter {i}"),
                    number: i as f32,
                    url: format!("ch_{i}"),
                })
                .collect(),
        ),
        ..manga.clone()
    }
}

struct FakeRepository {
    calls: Mutex<Vec<String>>,
    fail_delete: bool,
    /// Observes the change stream so deletion can prove nothing was emitted yet
    observer: Mutex<broadcast::Receiver<Option<LocalManga>>>,
}

impl FakeRepository {
    fn new(changes: &LocalStorageChanges, fail_delete: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_delete,
            observer: Mutex::new(changes.subscribe()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("lock").push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LocalMangaRepository for FakeRepository {
    async fn list(&self) -> LocalResult<Vec<LocalManga>> {
        self.record("list");
        Ok(Vec::new())
    }

    async fn find_local(&self, manga_id: i64) -> LocalResult<Option<LocalManga>> {
        self.record("find_local");
        Ok(Some(LocalManga::new(
            with_chapters(&Manga {
                id: manga_id,
                ..sample_manga()
            }),
            PathBuf::from("/library/yotsuba"),
        )))
    }

    async fn get_details(&self, manga: &Manga) -> LocalResult<Manga> {
        self.record("get_details");
        Ok(with_chapters(manga))
    }

    async fn delete_chapters(&self, manga: &Manga, chapter_ids: &BTreeSet<i64>) -> LocalResult<()> {
        let pending = self.observer.lock().expect("lock").try_recv();
        assert!(matches!(pending, Err(TryRecvError::Empty)));
        assert!(manga.chapters.is_some());

        self.record(format!("delete_chapters {chapter_ids:?}"));
        if self.fail_delete {
            return Err(LocalError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only storage",
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
    cancelled: Mutex<Vec<u32>>,
}

impl RecordingNotifier {
    fn errors(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .expect("lock")
            .iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: Notification) {
        self.shown.lock().expect("lock").push(notification);
    }

    fn cancel(&self, id: u32) {
        self.cancelled.lock().expect("lock").push(id);
    }
}

struct Fixture {
    repository: Arc<FakeRepository>,
    notifier: Arc<RecordingNotifier>,
    changes: LocalStorageChanges,
    service: ChaptersRemoveService,
}

fn fixture(fail_delete: bool) -> Fixture {
    let changes = LocalStorageChanges::new();
    let repository = Arc::new(FakeRepository::new(&changes, fail_delete));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = ChaptersRemoveService::new(repository.clone(), changes.clone(), notifier.clone());
    Fixture {
        repository,
        notifier,
        changes,
        service,
    }
}

#[tokio::test]
async fn empty_chapter_set_starts_nothing() {
    let f = fixture(false);
    let mut rx = f.changes.subscribe();

    let handle = f.service.start(sample_manga(), Vec::<i64>::new());

    assert!(handle.is_none());
    assert!(!f.service.is_running());
    assert!(f.repository.calls().is_empty());
    assert!(f.notifier.shown.lock().expect("lock").is_empty());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn deletes_once_then_publishes_change() {
    let f = fixture(false);
    let mut rx = f.changes.subscribe();

    f.service
        .start(sample_manga(), [3, 1, 3])
        .expect("work should start")
        .await
        .expect("task");

    assert_eq!(
        f.repository.calls(),
        vec![
            "get_details".to_string(),
            "delete_chapters {1, 3}".to_string(),
            "find_local".to_string(),
        ]
    );

    let change = rx.try_recv().expect("change event").expect("local manga");
    assert_eq!(change.manga.id, 42);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    assert!(f.notifier.errors().is_empty());
    assert_eq!(*f.notifier.cancelled.lock().expect("lock"), vec![21]);
    assert!(!f.service.is_running());
}

#[tokio::test]
async fn failed_delete_notifies_once_without_change() {
    let f = fixture(true);
    let mut rx = f.changes.subscribe();

    f.service
        .start(sample_manga(), [2])
        .expect("work should start")
        .await
        .expect("task");

    let errors = f.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, 22);
    assert_eq!(
        errors[0].text.as_deref(),
        Some("File operation failed: read-only storage")
    );
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert!(!f.service.is_running());
}

#[tokio::test]
async fn start_ids_increase_per_invocation() {
    let f = fixture(true);

    for ids in [[1], [2]] {
        f.service
            .start(sample_manga(), ids)
            .expect("work should start")
            .await
            .expect("task");
    }

    let ids: Vec<u32> = f.notifier.errors().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![22, 23]);
}

/// Lets each `delete_chapters` call through only when a permit is added.
struct GatedRepository {
    gate: Semaphore,
}

#[async_trait]
impl LocalMangaRepository for GatedRepository {
    async fn list(&self) -> LocalResult<Vec<LocalManga>> {
        Ok(Vec::new())
    }

    async fn find_local(&self, _manga_id: i64) -> LocalResult<Option<LocalManga>> {
        Ok(None)
    }

    async fn get_details(&self, manga: &Manga) -> LocalResult<Manga> {
        Ok(with_chapters(manga))
    }

    async fn delete_chapters(&self, _manga: &Manga, _ids: &BTreeSet<i64>) -> LocalResult<()> {
        self.gate.acquire().await.expect("gate").forget();
        Ok(())
    }
}

/// The first `cancel` is slow, leaving room for another job to start.
#[derive(Default)]
struct SlowCancelNotifier {
    log: Mutex<Vec<String>>,
    cancelling: AtomicBool,
}

impl SlowCancelNotifier {
    fn log(&self) -> Vec<String> {
        self.log.lock().expect("lock").clone()
    }

    fn progress_visible(&self) -> bool {
        self.log()
            .iter()
            .rev()
            .find(|entry| entry.ends_with(" 21"))
            .is_some_and(|entry| entry.starts_with("show"))
    }
}

impl Notifier for SlowCancelNotifier {
    fn show(&self, notification: Notification) {
        self.log
            .lock()
            .expect("lock")
            .push(format!("show {}", notification.id));
    }

    fn cancel(&self, id: u32) {
        if !self.cancelling.swap(true, Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.log.lock().expect("lock").push(format!("cancel {id}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_stays_visible_for_overlapping_jobs() {
    let repository = Arc::new(GatedRepository {
        gate: Semaphore::new(1),
    });
    let notifier = Arc::new(SlowCancelNotifier::default());
    let service = ChaptersRemoveService::new(
        repository.clone(),
        LocalStorageChanges::new(),
        notifier.clone(),
    );

    let first = service.start(sample_manga(), [1]).expect("first job");
    while !notifier.cancelling.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // First job is inside its cancel call while the second one starts
    let second = service.start(sample_manga(), [2]).expect("second job");
    first.await.expect("first task");
    while notifier.log().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(service.is_running());
    assert!(notifier.progress_visible());
    assert_eq!(notifier.log(), vec!["show 21", "cancel 21", "show 21"]);

    repository.gate.add_permits(1);
    second.await.expect("second task");
    assert!(!service.is_running());
    assert!(!notifier.progress_visible());
}
