//! Responsiveness core of the vinyl media shell: windowed list rendering,
//! time-sliced directory listing, lyric time sync and a frame budget monitor.

pub mod cli;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod media;
pub mod monitor;
pub mod scanner;
pub mod sync;
pub mod watcher;
pub mod window;
