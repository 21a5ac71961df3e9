//! CLI subcommand implementations.

use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::lyrics::{self, LyricLine};
use crate::media;
use crate::monitor::{FrameBudgetMonitor, MonitorEvent};
use crate::scanner::{Enumerator, Node, ScanOptions, SortMethod, Source};
use crate::sync::{self, ClockSample, FollowLayout, SyncEngine};
use crate::watcher::{DirWatcher, FsEvent};
use crate::window::Viewport;

const DEFAULT_ROWS: usize = 15;
const PLAY_TICK: Duration = Duration::from_millis(100);

// ── browse ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BrowseArgs {
    pub hidden: bool,
    pub sort: Option<SortMethod>,
    pub scroll: usize,
    pub rows: Option<usize>,
    pub delegated: bool,
    pub watch: bool,
}

pub fn browse(cfg: &Config, dir: &Path, args: &BrowseArgs) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let mut options = ScanOptions::from(&cfg.browse);
    options.show_hidden |= args.hidden;
    if let Some(sort) = args.sort {
        options.sort = sort;
    }

    let rows = args.rows.unwrap_or(DEFAULT_ROWS).max(1);
    let mut viewport = Viewport::new(
        rows as f64 * cfg.list.item_extent,
        cfg.list.item_extent,
        cfg.list.overscan,
    );
    viewport.scroll_to(args.scroll as f64 * cfg.list.item_extent);

    let nodes = list_level(cfg, dir, options, args.delegated)?;
    print_window(&mut viewport, &nodes);

    if !args.watch {
        return Ok(());
    }
    let (_watcher, rx) = DirWatcher::start(dir, options.show_hidden)
        .with_context(|| format!("cannot watch {}", dir.display()))?;
    println!("watching {} (Ctrl-C to quit)", dir.display());
    while let Ok(first) = rx.recv() {
        let mut changed = vec![first];
        // coalesce bursts (editors write, rename and chmod in one go)
        while let Ok(ev) = rx.recv_timeout(Duration::from_millis(200)) {
            changed.push(ev);
        }
        for ev in &changed {
            match ev {
                FsEvent::Changed(p) => debug!("changed {}", p.display()),
                FsEvent::Removed(p) => debug!("removed {}", p.display()),
            }
        }
        println!("-- {} change(s), re-listing", changed.len());
        let nodes = list_level(cfg, dir, options, args.delegated)?;
        print_window(&mut viewport, &nodes);
    }
    Ok(())
}

fn list_level(
    cfg: &Config,
    dir: &Path,
    options: ScanOptions,
    delegated: bool,
) -> Result<Vec<Node>> {
    // delegated scans walk the path and carry size and modified time
    let source = if delegated {
        Source::path(dir)
    } else {
        Source::local(dir)
    };
    let mut en = Enumerator::new(source, "", options)
        .with_budget(Duration::from_millis(cfg.scan.slice_budget_ms));
    let started = Instant::now();
    let nodes = en
        .run(|stats| debug!("slice {} ({} seen)", stats.slices, stats.seen))
        .with_context(|| format!("cannot list {}", dir.display()))?
        .unwrap_or_default();
    let stats = en.stats();
    info!(
        "listed {} of {} entries in {} slice(s), {:?}",
        stats.kept,
        stats.seen,
        stats.slices,
        started.elapsed()
    );
    Ok(nodes)
}

fn print_window(viewport: &mut Viewport, nodes: &[Node]) {
    viewport.clamp_scroll(nodes.len());
    let window = viewport.window(nodes);
    if window.is_empty() {
        println!("(no folders or playable media)");
        return;
    }
    for (placement, node) in window.iter() {
        let kind = if node.is_dir() {
            "dir"
        } else {
            media::media_kind(&node.name).map_or("file", |k| k.name())
        };
        let size = node
            .size
            .map(|b| media::format_bytes(b, 1))
            .unwrap_or_default();
        println!(
            "{:>6} {:>8.0}  {:<5} {:>9}  {}",
            placement.index, placement.offset, kind, size, node.name
        );
    }
    let range = window.range();
    println!(
        "-- rows {}..{} of {} (content {:.0})",
        range.start,
        range.end,
        nodes.len(),
        window.content_extent()
    );
}

// ── lyrics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct LyricsArgs {
    pub at: Option<f64>,
    pub offset: f64,
    pub play: Option<f64>,
}

pub fn lyrics(cfg: &Config, file: &Path, args: &LyricsArgs) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let lines = lyrics::parse(&raw);
    if lines.is_empty() {
        println!("no timed lines in {}", file.display());
        return Ok(());
    }

    if let Some(duration) = args.play {
        return simulate(cfg, &raw, args.offset, duration);
    }
    if let Some(at) = args.at {
        match sync::resolve_active_index(&lines, at, args.offset) {
            Some(i) => print_line(i, &lines[i]),
            None => println!("(before first line)"),
        }
        return Ok(());
    }
    for (i, line) in lines.iter().enumerate() {
        print_line(i, line);
    }
    Ok(())
}

fn print_line(index: usize, line: &LyricLine) {
    println!("{:>4} {}  {}", index, lyrics::format_clock(line.time), line.text);
}

/// Play the track back on a fake clock and report what the view would do.
fn simulate(cfg: &Config, raw: &str, offset: f64, duration: f64) -> Result<()> {
    let layout = FollowLayout {
        viewport_extent: DEFAULT_ROWS as f64 * cfg.list.item_extent,
        line_extent: cfg.list.item_extent,
    };
    let mut engine = SyncEngine::new(&cfg.lyrics, layout);
    engine.load_track(raw);
    let mut pending = None;
    if cfg.lyrics.sync_step > 0.0 {
        let steps = (offset / cfg.lyrics.sync_step).round() as i32;
        pending = engine.nudge_offset(steps);
    }

    let ticks = (duration.max(0.0) / PLAY_TICK.as_secs_f64()).ceil() as u64;
    for seq in 0..=ticks {
        let now = seq as f64 * PLAY_TICK.as_secs_f64();
        let cmd = engine.tick(ClockSample::new(seq, now)).or(pending.take());
        engine.frame(PLAY_TICK);
        let Some(cmd) = cmd else { continue };
        if let (Some(i), Some(line)) = (engine.active_index(), engine.active_line()) {
            println!(
                "{} #{:<4} {:<40} scroll {:.0}{}",
                lyrics::format_clock(now),
                i,
                line.text,
                cmd.target,
                if cmd.smooth { " (eased)" } else { "" }
            );
        }
    }
    engine.close();
    Ok(())
}

// ── config ──────────────────────────────────────────────────────────────

pub fn show_config(cfg: &Config, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    let json = serde_json::to_string_pretty(cfg).context("cannot encode config")?;
    println!("{}", json);
    Ok(())
}

// ── monitor ─────────────────────────────────────────────────────────────

/// Drive the monitor with a synthetic frame loop at `fps` for `seconds`.
pub fn monitor(cfg: &Config, seconds: u64, fps: u32) -> Result<()> {
    if fps == 0 {
        bail!("--fps must be at least 1");
    }
    let (tx, rx) = mpsc::channel();
    let mut monitor = FrameBudgetMonitor::new(cfg.monitor.clone());
    let _sub = monitor.subscribe(move |ev| {
        tx.send(*ev).ok();
    });
    monitor.start().context("cannot start monitor")?;

    let frame = Duration::from_secs_f64(1.0 / f64::from(fps));
    let until = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < until {
        monitor.frame();
        std::thread::sleep(frame);
        for ev in rx.try_iter() {
            print_event(&ev);
        }
    }
    monitor.stop();
    for ev in rx.try_iter() {
        print_event(&ev);
    }
    Ok(())
}

fn print_event(ev: &MonitorEvent) {
    match ev {
        MonitorEvent::Sample(s) => {
            let mem = s
                .memory_mb
                .map(|m| format!("{} MB", m))
                .unwrap_or_else(|| "-".into());
            let state = if s.degraded { "degraded" } else { "ok" };
            println!("fps {:>3}  mem {:>7}  {}", s.fps, mem, state);
        }
        MonitorEvent::Degraded(s) => println!(">> degraded at {} fps, reducing motion", s.fps),
        MonitorEvent::Restored(s) => println!(">> restored at {} fps", s.fps),
    }
}
