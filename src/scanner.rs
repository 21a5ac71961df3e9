//! Directory scanner: list one directory level without blocking the frame loop.
//!
//! An [`Enumerator`] is a resumable state machine. Each [`Enumerator::step`]
//! pulls entries until the slice budget is spent and then hands control back;
//! the enumerator itself is the resume token, so the next `step` continues
//! from the same entry. Filtering happens as entries arrive, sorting only
//! once the whole level has been collected.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::BrowseConfig;
use crate::error::ScanError;
use crate::media;

/// One frame at 60 Hz.
pub const DEFAULT_SLICE_BUDGET: Duration = Duration::from_millis(16);

const HIDDEN_MARKER: char = '.';

// ── Nodes ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    File,
    Directory,
}

/// A listed entry. `path` is its identity key (selection sets, navigation).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub path: String,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    #[default]
    Name,
    /// Newest first. Best-effort: entries without a modified time go last.
    Date,
    Type,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ScanOptions {
    pub show_hidden: bool,
    pub sort: SortMethod,
}

impl From<&BrowseConfig> for ScanOptions {
    fn from(cfg: &BrowseConfig) -> Self {
        ScanOptions {
            show_hidden: cfg.show_hidden,
            sort: cfg.sort,
        }
    }
}

// ── Sources ─────────────────────────────────────────────────────────────

/// An entry as the source reports it, before filtering.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawEntry {
    pub name: String,
    pub kind: NodeKind,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

pub type EntryIter = Box<dyn Iterator<Item = io::Result<RawEntry>>>;

/// An opened directory the process reads itself, entry by entry.
pub trait DirHandle {
    /// Where the handle points, for error reporting.
    fn location(&self) -> &Path;

    fn entries(&self) -> io::Result<EntryIter>;
}

/// `DirHandle` over `std::fs::read_dir`. Reports names and kinds only.
pub struct FsHandle {
    dir: PathBuf,
}

impl FsHandle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsHandle { dir: dir.into() }
    }
}

impl DirHandle for FsHandle {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn entries(&self) -> io::Result<EntryIter> {
        let read = std::fs::read_dir(&self.dir)?;
        Ok(Box::new(read.map(|res| {
            let entry = res?;
            let ft = entry.file_type()?;
            let is_dir = if ft.is_symlink() {
                std::fs::metadata(entry.path())
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
            } else {
                ft.is_dir()
            };
            Ok(RawEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if is_dir {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
                size: None,
                modified: None,
            })
        })))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MetadataLevel {
    /// Name and kind.
    Basic,
    /// Name, kind, size and modification time.
    Enriched,
}

/// Where a level is read from.
pub enum Source {
    /// An in-process handle; basic metadata.
    Handle(Box<dyn DirHandle>),
    /// A plain path walked through `walkdir`; enriched metadata.
    Path(PathBuf),
}

impl Source {
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        Source::Handle(Box::new(FsHandle::new(dir)))
    }

    pub fn path(dir: impl Into<PathBuf>) -> Self {
        Source::Path(dir.into())
    }

    pub fn location(&self) -> PathBuf {
        match self {
            Source::Handle(h) => h.location().to_path_buf(),
            Source::Path(p) => p.clone(),
        }
    }

    pub fn metadata_level(&self) -> MetadataLevel {
        match self {
            Source::Handle(_) => MetadataLevel::Basic,
            Source::Path(_) => MetadataLevel::Enriched,
        }
    }

    fn open(self) -> io::Result<EntryIter> {
        match self {
            Source::Handle(h) => h.entries(),
            Source::Path(dir) => Ok(walk_level(dir)),
        }
    }
}

/// One level of `dir` with metadata. Failures reading `dir` itself surface as
/// errors; a single unreadable child (broken symlink) is skipped.
fn walk_level(dir: PathBuf) -> EntryIter {
    let it = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|res| {
            let entry = match res {
                Ok(e) => e,
                Err(e) if is_child_failure(e.depth(), e.path().is_some()) => {
                    debug!("scan: skipping entry: {}", e);
                    return None;
                }
                Err(e) => return Some(Err(io::Error::from(e))),
            };
            let meta = entry.metadata().ok();
            let kind = if entry.file_type().is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            };
            Some(Ok(RawEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                size: meta.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
                modified: meta.as_ref().and_then(|m| m.modified().ok()),
            }))
        });
    Box::new(it)
}

/// A walk error that concerns one child entry rather than the listing.
///
/// Reading the level itself fails without a path (at depth 1 once the walk
/// has started), and opening the root fails at depth 0. Only stat failures
/// on a named child may be skipped.
fn is_child_failure(depth: usize, has_path: bool) -> bool {
    depth > 0 && has_path
}

// ── Cancellation ────────────────────────────────────────────────────────

/// Liveness flag shared between a view and the scans it started.
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Acquire)
    }
}

// ── Enumerator ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ScanStats {
    pub seen: usize,
    pub kept: usize,
    pub slices: usize,
}

#[derive(Debug)]
pub enum Progress {
    /// The slice budget ran out; call `step` again to continue.
    Yielded,
    /// The level is complete, filtered and sorted.
    Done(Vec<Node>),
    /// Cancelled, or the enumerator already finished. Nothing more will come.
    Stopped,
}

enum State {
    Pending(Source),
    Running(EntryIter),
    Finished,
}

enum Outcome {
    Yield,
    Exhausted,
    Cancelled,
    Failed(io::Error),
}

pub struct Enumerator {
    state: State,
    location: PathBuf,
    prefix: String,
    options: ScanOptions,
    budget: Duration,
    cancel: CancelToken,
    collected: Vec<Node>,
    stats: ScanStats,
}

impl Enumerator {
    pub fn new(source: Source, prefix: &str, options: ScanOptions) -> Self {
        Enumerator {
            location: source.location(),
            state: State::Pending(source),
            prefix: prefix.trim_end_matches('/').to_string(),
            options,
            budget: DEFAULT_SLICE_BUDGET,
            cancel: CancelToken::new(),
            collected: Vec::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Run one time slice. At least one entry is consumed per slice, so a
    /// zero budget still makes progress.
    pub fn step(&mut self) -> Result<Progress, ScanError> {
        if self.cancel.is_cancelled() {
            return Ok(self.stop());
        }
        let started = Instant::now();

        self.state = match std::mem::replace(&mut self.state, State::Finished) {
            State::Pending(source) => match source.open() {
                Ok(entries) => State::Running(entries),
                Err(e) => return Err(self.fail(e)),
            },
            other => other,
        };

        let outcome = {
            let entries = match &mut self.state {
                State::Running(entries) => entries,
                _ => return Ok(Progress::Stopped),
            };
            self.stats.slices += 1;
            loop {
                if self.cancel.is_cancelled() {
                    break Outcome::Cancelled;
                }
                match entries.next() {
                    None => break Outcome::Exhausted,
                    Some(Err(e)) => break Outcome::Failed(e),
                    Some(Ok(raw)) => {
                        self.stats.seen += 1;
                        if let Some(node) = admit(raw, &self.options, &self.prefix) {
                            self.stats.kept += 1;
                            self.collected.push(node);
                        }
                    }
                }
                if started.elapsed() >= self.budget {
                    break Outcome::Yield;
                }
            }
        };

        match outcome {
            Outcome::Yield => {
                debug!(
                    "scan: {} yield after slice {} ({} seen)",
                    self.location.display(),
                    self.stats.slices,
                    self.stats.seen
                );
                Ok(Progress::Yielded)
            }
            Outcome::Cancelled => Ok(self.stop()),
            Outcome::Failed(e) => Err(self.fail(e)),
            Outcome::Exhausted => {
                self.state = State::Finished;
                let mut nodes = std::mem::take(&mut self.collected);
                sort_nodes(&mut nodes, self.options.sort);
                info!(
                    "scan: {}: {} of {} entries in {} slices",
                    self.location.display(),
                    nodes.len(),
                    self.stats.seen,
                    self.stats.slices
                );
                Ok(Progress::Done(nodes))
            }
        }
    }

    /// Drive slices to completion, calling `between` after every yield so the
    /// host can pump its event loop. `Ok(None)` means the scan was cancelled.
    pub fn run(
        &mut self,
        mut between: impl FnMut(&ScanStats),
    ) -> Result<Option<Vec<Node>>, ScanError> {
        loop {
            match self.step()? {
                Progress::Yielded => between(&self.stats),
                Progress::Done(nodes) => return Ok(Some(nodes)),
                Progress::Stopped => return Ok(None),
            }
        }
    }

    fn stop(&mut self) -> Progress {
        if !matches!(self.state, State::Finished) {
            debug!("scan: {} cancelled", self.location.display());
        }
        self.state = State::Finished;
        self.collected.clear();
        Progress::Stopped
    }

    fn fail(&mut self, e: io::Error) -> ScanError {
        self.state = State::Finished;
        self.collected.clear();
        ScanError::access(self.location.clone(), e)
    }
}

/// List one level with the default slice budget, yielding the thread
/// between slices.
pub fn enumerate(
    source: Source,
    prefix: &str,
    options: ScanOptions,
) -> Result<Vec<Node>, ScanError> {
    let mut en = Enumerator::new(source, prefix, options);
    let nodes = en.run(|_| std::thread::yield_now())?;
    Ok(nodes.unwrap_or_default())
}

/// Dot-prefixed names are hidden unless the caller asks for them.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_MARKER)
}

fn admit(raw: RawEntry, options: &ScanOptions, prefix: &str) -> Option<Node> {
    if !options.show_hidden && is_hidden(&raw.name) {
        return None;
    }
    if raw.kind == NodeKind::File && !media::is_playable(&raw.name) {
        return None;
    }
    let path = if prefix.is_empty() {
        raw.name.clone()
    } else {
        format!("{}/{}", prefix, raw.name)
    };
    Some(Node {
        name: raw.name,
        kind: raw.kind,
        path,
        size: raw.size,
        modified: raw.modified,
    })
}

// ── Sorting ─────────────────────────────────────────────────────────────

pub fn sort_nodes(nodes: &mut [Node], method: SortMethod) {
    nodes.sort_by(|a, b| compare(a, b, method));
}

fn compare(a: &Node, b: &Node, method: SortMethod) -> Ordering {
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| match method {
            SortMethod::Name => Ordering::Equal,
            SortMethod::Type => media::ext_of(&a.name).cmp(&media::ext_of(&b.name)),
            SortMethod::Date => match (a.modified, b.modified) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        })
        .then_with(|| by_name(a, b))
}

fn kind_rank(n: &Node) -> u8 {
    match n.kind {
        NodeKind::Directory => 0,
        NodeKind::File => 1,
    }
}

fn by_name(a: &Node, b: &Node) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// In-memory handle that can fail after a number of entries, and can be
    /// slow to produce each one.
    struct FakeHandle {
        dir: PathBuf,
        entries: Vec<RawEntry>,
        fail_after: Option<usize>,
        delay: Duration,
        opened: Rc<Cell<usize>>,
    }

    impl FakeHandle {
        fn new(entries: Vec<RawEntry>) -> Self {
            FakeHandle {
                dir: PathBuf::from("/fake"),
                entries,
                fail_after: None,
                delay: Duration::ZERO,
                opened: Rc::new(Cell::new(0)),
            }
        }
    }

    impl DirHandle for FakeHandle {
        fn location(&self) -> &Path {
            &self.dir
        }

        fn entries(&self) -> io::Result<EntryIter> {
            self.opened.set(self.opened.get() + 1);
            let fail_after = self.fail_after;
            let delay = self.delay;
            let it = self
                .entries
                .clone()
                .into_iter()
                .enumerate()
                .map(move |(i, e)| {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    match fail_after {
                        Some(n) if i >= n => Err(io::Error::new(
                            io::ErrorKind::PermissionDenied,
                            "handle revoked",
                        )),
                        _ => Ok(e),
                    }
                });
            Ok(Box::new(it))
        }
    }

    fn file(name: &str) -> RawEntry {
        RawEntry {
            name: name.into(),
            kind: NodeKind::File,
            size: None,
            modified: None,
        }
    }

    fn dir(name: &str) -> RawEntry {
        RawEntry {
            name: name.into(),
            kind: NodeKind::Directory,
            size: None,
            modified: None,
        }
    }

    fn dated(name: &str, secs: u64) -> RawEntry {
        RawEntry {
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            ..file(name)
        }
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn scan(entries: Vec<RawEntry>, options: ScanOptions) -> Vec<Node> {
        enumerate(
            Source::Handle(Box::new(FakeHandle::new(entries))),
            "Music",
            options,
        )
        .unwrap()
    }

    // ── filtering ───────────────────────────────────────────────────────

    #[test]
    fn hidden_entries_dropped_by_default() {
        let nodes = scan(
            vec![file(".secret.mp3"), dir(".cache"), file("song.mp3")],
            ScanOptions::default(),
        );
        assert_eq!(names(&nodes), vec!["song.mp3"]);
    }

    #[test]
    fn hidden_entries_kept_when_requested() {
        let opts = ScanOptions {
            show_hidden: true,
            ..Default::default()
        };
        let nodes = scan(vec![file(".secret.mp3"), dir(".cache")], opts);
        assert_eq!(names(&nodes), vec![".cache", ".secret.mp3"]);
    }

    #[test]
    fn non_media_files_dropped_but_dirs_kept() {
        let nodes = scan(
            vec![
                file("cover.jpg"),
                file("notes.txt"),
                dir("extras.txt"),
                file("clip.mkv"),
            ],
            ScanOptions::default(),
        );
        assert_eq!(names(&nodes), vec!["extras.txt", "clip.mkv"]);
    }

    #[test]
    fn paths_join_prefix() {
        let nodes = scan(vec![file("a.mp3")], ScanOptions::default());
        assert_eq!(nodes[0].path, "Music/a.mp3");

        let nodes = enumerate(
            Source::Handle(Box::new(FakeHandle::new(vec![file("a.mp3")]))),
            "",
            ScanOptions::default(),
        )
        .unwrap();
        assert_eq!(nodes[0].path, "a.mp3");
    }

    // ── sorting ─────────────────────────────────────────────────────────

    #[test]
    fn name_sort_puts_dirs_first() {
        let nodes = scan(
            vec![file("b.mp3"), dir("Zed"), file("A.flac"), dir("alpha")],
            ScanOptions::default(),
        );
        assert_eq!(names(&nodes), vec!["alpha", "Zed", "A.flac", "b.mp3"]);
    }

    #[test]
    fn type_sort_by_extension_then_name() {
        let opts = ScanOptions {
            sort: SortMethod::Type,
            ..Default::default()
        };
        let nodes = scan(
            vec![file("z.flac"), file("b.mp3"), file("a.mp3"), dir("d")],
            opts,
        );
        assert_eq!(names(&nodes), vec!["d", "z.flac", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn date_sort_newest_first_undated_last() {
        let opts = ScanOptions {
            sort: SortMethod::Date,
            ..Default::default()
        };
        let nodes = scan(
            vec![
                file("undated.mp3"),
                dated("old.mp3", 100),
                dated("new.mp3", 900),
                dir("folder"),
            ],
            opts,
        );
        assert_eq!(
            names(&nodes),
            vec!["folder", "new.mp3", "old.mp3", "undated.mp3"]
        );
    }

    #[test]
    fn repeated_scan_is_identical() {
        let entries = vec![file("c.mp3"), dir("x"), file("a.wav"), file("B.ogg")];
        let first = scan(entries.clone(), ScanOptions::default());
        let second = scan(entries, ScanOptions::default());
        assert_eq!(first, second);
    }

    // ── time slicing ────────────────────────────────────────────────────

    #[test]
    fn zero_budget_yields_after_every_entry() {
        let handle = FakeHandle::new(vec![file("a.mp3"), file("b.mp3"), file("c.mp3")]);
        let opened = handle.opened.clone();
        let mut en = Enumerator::new(
            Source::Handle(Box::new(handle)),
            "",
            ScanOptions::default(),
        )
        .with_budget(Duration::ZERO);

        let mut yields = 0;
        let nodes = loop {
            match en.step().unwrap() {
                Progress::Yielded => yields += 1,
                Progress::Done(nodes) => break nodes,
                Progress::Stopped => panic!("not cancelled"),
            }
        };
        assert_eq!(yields, 3);
        assert_eq!(names(&nodes), vec!["a.mp3", "b.mp3", "c.mp3"]);
        // resumed, never restarted
        assert_eq!(opened.get(), 1);
        assert_eq!(en.stats().seen, 3);
    }

    #[test]
    fn slice_runs_until_budget_then_resumes() {
        let mut handle = FakeHandle::new((0..12).map(|i| file(&format!("{:02}.mp3", i))).collect());
        handle.delay = Duration::from_millis(5);
        let opened = handle.opened.clone();
        let mut en = Enumerator::new(Source::Handle(Box::new(handle)), "", ScanOptions::default())
            .with_budget(Duration::from_millis(16));

        // 12 entries at 5 ms each cannot fit in one 16 ms slice
        assert!(matches!(en.step().unwrap(), Progress::Yielded));
        let first = en.stats().seen;
        assert!(first > 1, "first slice consumed only {} entry", first);
        assert!(first < 12);

        let nodes = loop {
            match en.step().unwrap() {
                Progress::Yielded => assert!(en.stats().seen > first),
                Progress::Done(nodes) => break nodes,
                Progress::Stopped => panic!("not cancelled"),
            }
        };
        assert_eq!(nodes.len(), 12);
        assert!(en.stats().slices >= 2);
        assert_eq!(opened.get(), 1);
    }

    #[test]
    fn sliced_and_unsliced_agree() {
        let entries: Vec<RawEntry> = (0..50)
            .map(|i| file(&format!("t{:02}.mp3", 49 - i)))
            .collect();
        let mut sliced = Enumerator::new(
            Source::Handle(Box::new(FakeHandle::new(entries.clone()))),
            "x",
            ScanOptions::default(),
        )
        .with_budget(Duration::ZERO);
        let mut pumps = 0;
        let a = sliced.run(|_| pumps += 1).unwrap().unwrap();
        let b = scan(entries, ScanOptions::default());
        assert_eq!(pumps, 50);
        assert_eq!(a.len(), 50);
        assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn finished_enumerator_is_spent() {
        let mut en = Enumerator::new(
            Source::Handle(Box::new(FakeHandle::new(vec![file("a.mp3")]))),
            "",
            ScanOptions::default(),
        );
        assert!(matches!(en.step().unwrap(), Progress::Done(_)));
        assert!(matches!(en.step().unwrap(), Progress::Stopped));
    }

    // ── cancellation ────────────────────────────────────────────────────

    #[test]
    fn cancel_mid_scan_stops_cleanly() {
        let cancel = CancelToken::new();
        let mut en = Enumerator::new(
            Source::Handle(Box::new(FakeHandle::new(vec![
                file("a.mp3"),
                file("b.mp3"),
                file("c.mp3"),
            ]))),
            "",
            ScanOptions::default(),
        )
        .with_budget(Duration::ZERO)
        .with_cancel(cancel.clone());

        assert!(matches!(en.step().unwrap(), Progress::Yielded));
        cancel.cancel();
        assert!(matches!(en.step().unwrap(), Progress::Stopped));
        assert!(matches!(en.step().unwrap(), Progress::Stopped));
        assert_eq!(en.stats().seen, 1);
    }

    #[test]
    fn run_reports_cancellation_as_none() {
        let mut en = Enumerator::new(
            Source::Handle(Box::new(FakeHandle::new(vec![file("a.mp3"), file("b.mp3")]))),
            "",
            ScanOptions::default(),
        )
        .with_budget(Duration::ZERO);
        let token = en.cancel_token();
        let out = en.run(|_| token.cancel()).unwrap();
        assert!(out.is_none());
    }

    // ── access errors ───────────────────────────────────────────────────

    #[test]
    fn revoked_handle_is_access_error_without_partial_list() {
        let mut handle = FakeHandle::new(vec![file("a.mp3"), file("b.mp3"), file("c.mp3")]);
        handle.fail_after = Some(2);
        let mut en = Enumerator::new(Source::Handle(Box::new(handle)), "", ScanOptions::default())
            .with_budget(Duration::ZERO);

        assert!(matches!(en.step().unwrap(), Progress::Yielded));
        assert!(matches!(en.step().unwrap(), Progress::Yielded));
        let err = en.step().unwrap_err();
        assert!(matches!(err, ScanError::Access { .. }));
        assert!(err.to_string().contains("/fake"));
        assert!(matches!(en.step().unwrap(), Progress::Stopped));
    }

    #[test]
    fn missing_directory_is_access_error() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("gone");
        assert!(matches!(
            enumerate(Source::local(&gone), "", ScanOptions::default()),
            Err(ScanError::Access { .. })
        ));
        assert!(matches!(
            enumerate(Source::path(&gone), "", ScanOptions::default()),
            Err(ScanError::Access { .. })
        ));
    }

    #[test]
    fn only_named_child_failures_are_skipped() {
        // stat of one child failed: skip it
        assert!(is_child_failure(1, true));
        // reading the level broke off mid-way: no path, must surface
        assert!(!is_child_failure(1, false));
        // the root itself could not be opened
        assert!(!is_child_failure(0, true));
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ok.mp3"), b"x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing"), tmp.path().join("dangling.mp3"))
            .unwrap();
        let nodes = enumerate(Source::path(tmp.path()), "", ScanOptions::default()).unwrap();
        assert_eq!(names(&nodes), vec!["ok.mp3"]);
    }

    // ── real filesystem ─────────────────────────────────────────────────

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.mp3"), b"audio-bytes").unwrap();
        std::fs::write(tmp.path().join("a.mkv"), b"v").unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"nope").unwrap();
        std::fs::write(tmp.path().join(".hidden.mp3"), b"h").unwrap();
        std::fs::create_dir(tmp.path().join("Albums")).unwrap();
        std::fs::write(tmp.path().join("Albums").join("deep.mp3"), b"d").unwrap();
        tmp
    }

    #[test]
    fn local_handle_lists_one_level_basic() {
        let tmp = fixture();
        let nodes = enumerate(Source::local(tmp.path()), "root", ScanOptions::default()).unwrap();
        assert_eq!(names(&nodes), vec!["Albums", "a.mkv", "b.mp3"]);
        assert!(nodes[0].is_dir());
        assert!(nodes.iter().all(|n| n.size.is_none() && n.modified.is_none()));
        assert_eq!(Source::local(tmp.path()).metadata_level(), MetadataLevel::Basic);
    }

    #[test]
    fn path_source_carries_metadata() {
        let tmp = fixture();
        let nodes = enumerate(Source::path(tmp.path()), "root", ScanOptions::default()).unwrap();
        assert_eq!(names(&nodes), vec!["Albums", "a.mkv", "b.mp3"]);
        let song = nodes.iter().find(|n| n.name == "b.mp3").unwrap();
        assert_eq!(song.size, Some(11));
        assert!(song.modified.is_some());
        assert_eq!(song.path, "root/b.mp3");
        assert_eq!(Source::path(tmp.path()).metadata_level(), MetadataLevel::Enriched);
    }

    #[test]
    fn empty_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let nodes = enumerate(Source::local(tmp.path()), "", ScanOptions::default()).unwrap();
        assert!(nodes.is_empty());
    }
}
