//! Directory watcher: tells the browse view when the listed level changed.
//!
//! One background thread owns a `notify` watcher on a single directory
//! (non-recursive) and forwards relevant create/modify/remove events over a
//! channel, so the view can re-run the enumerator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::media;
use crate::scanner;

/// Events sent from the watcher thread to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    /// An entry was created or modified.
    Changed(PathBuf),
    Removed(PathBuf),
}

/// Handle to the running watcher. Drop to stop.
pub struct DirWatcher {
    dir: PathBuf,
    quit: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DirWatcher {
    /// Watch `dir` and return the handle plus a receiver for its events.
    pub fn start(
        dir: &Path,
        show_hidden: bool,
    ) -> Result<(Self, mpsc::Receiver<FsEvent>), WatchError> {
        let (ntx, nrx) = mpsc::channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            ntx.send(res).ok();
        })
        .map_err(WatchError::Create)?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: dir.to_path_buf(),
                source,
            })?;
        info!("watcher: watching {}", dir.display());

        let (tx, rx) = mpsc::channel();
        let quit = Arc::new(AtomicBool::new(false));
        let quit2 = quit.clone();
        let thread = std::thread::Builder::new()
            .name("dir-watcher".into())
            .spawn(move || run_watcher(watcher, nrx, tx, quit2, show_hidden))
            .map_err(WatchError::Spawn)?;

        Ok((
            DirWatcher {
                dir: dir.to_path_buf(),
                quit,
                thread: Some(thread),
            },
            rx,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stop(&mut self) {
        self.quit.store(true, Ordering::Release);
        if let Some(t) = self.thread.take() {
            t.join().ok();
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_watcher(
    watcher: RecommendedWatcher,
    nrx: mpsc::Receiver<notify::Result<notify::Event>>,
    tx: mpsc::Sender<FsEvent>,
    quit: Arc<AtomicBool>,
    show_hidden: bool,
) {
    // keep the watcher alive for as long as the loop runs
    let _watcher = watcher;
    while !quit.load(Ordering::Acquire) {
        match nrx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(event)) => {
                for ev in translate(&event, show_hidden) {
                    if tx.send(ev).is_err() {
                        debug!("watcher: receiver gone");
                        return;
                    }
                }
            }
            Ok(Err(e)) => warn!("watcher: {}", e),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("watcher: stopped");
}

fn translate(event: &notify::Event, show_hidden: bool) -> Vec<FsEvent> {
    let removed = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => false,
        EventKind::Remove(_) => true,
        _ => return Vec::new(),
    };
    event
        .paths
        .iter()
        .filter(|p| is_relevant(p, removed, show_hidden))
        .map(|p| {
            if removed {
                FsEvent::Removed(p.clone())
            } else {
                FsEvent::Changed(p.clone())
            }
        })
        .collect()
}

/// Whether a path could show up in the listing. A removed path no longer
/// exists, so an extension-less name is assumed to have been a directory.
fn is_relevant(path: &Path, removed: bool, show_hidden: bool) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !show_hidden && scanner::is_hidden(name) {
        return false;
    }
    if media::is_playable(name) {
        return true;
    }
    if removed {
        media::ext_of(name).is_empty()
    } else {
        path.is_dir()
    }
}
