//! Time-sync engine: maps the playback clock onto sorted lyric lines and
//! keeps the active line in view until the user takes over scrolling.

use std::time::Duration;

use tracing::debug;

use crate::config::LyricsConfig;
use crate::lyrics::{self, LyricLine};

/// Greatest index whose time is `<= current_time + offset`.
///
/// `None` before the first line. After the last cue the last line stays
/// active. O(log n): this runs on every clock tick.
pub fn resolve_active_index(lines: &[LyricLine], current_time: f64, offset: f64) -> Option<usize> {
    let t = current_time + offset;
    if t.is_nan() {
        return None;
    }
    lines.partition_point(|l| l.time <= t).checked_sub(1)
}

// ── Follow state ────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FollowState {
    #[default]
    AutoFollowing,
    UserOverridden,
}

/// Request to move the lyric view so the active line sits at the anchor.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ScrollCommand {
    pub target: f64,
    /// Animate towards `target`; false means jump.
    pub smooth: bool,
}

/// Geometry the follow target is computed against.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FollowLayout {
    pub viewport_extent: f64,
    pub line_extent: f64,
}

/// One reading of the playback clock. `seq` increases with every reading
/// the transport produces.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ClockSample {
    pub seq: u64,
    pub seconds: f64,
}

impl ClockSample {
    pub fn new(seq: u64, seconds: f64) -> Self {
        ClockSample { seq, seconds }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Emphasis {
    Active,
    Near,
    Past,
    Upcoming,
}

// ── Follow animation ────────────────────────────────────────────────────

/// Ease-out transition of the scroll offset, advanced once per frame.
#[derive(Clone, Debug, Default)]
pub struct FollowAnimation {
    from: f64,
    to: f64,
    elapsed: Duration,
    duration: Duration,
    running: bool,
}

impl FollowAnimation {
    /// Replace whatever is running with a transition `from` → `to`.
    pub fn start(&mut self, from: f64, to: f64, duration: Duration) {
        *self = FollowAnimation {
            from,
            to,
            elapsed: Duration::ZERO,
            duration,
            running: true,
        };
    }

    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    /// Offset after `dt` more time, or `None` when nothing is running.
    pub fn advance(&mut self, dt: Duration) -> Option<f64> {
        if !self.running {
            return None;
        }
        self.elapsed += dt;
        if self.duration.is_zero() || self.elapsed >= self.duration {
            self.running = false;
            return Some(self.to);
        }
        let t = self.elapsed.as_secs_f64() / self.duration.as_secs_f64();
        Some(self.from + (self.to - self.from) * ease_out_cubic(t))
    }
}

fn ease_out_cubic(t: f64) -> f64 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Per-view sync state: the cursor, the follow machine and its animation.
#[derive(Debug)]
pub struct SyncEngine {
    lines: Vec<LyricLine>,
    active: Option<usize>,
    offset_ms: i64,
    follow: FollowState,
    last_seq: Option<u64>,
    last_clock: f64,
    layout: FollowLayout,
    scroll_offset: f64,
    animation: FollowAnimation,
    reduced_motion: bool,
    anchor: f64,
    step_ms: i64,
    near_window: usize,
    follow_duration: Duration,
}

impl SyncEngine {
    pub fn new(cfg: &LyricsConfig, layout: FollowLayout) -> Self {
        SyncEngine {
            lines: Vec::new(),
            active: None,
            offset_ms: 0,
            follow: FollowState::AutoFollowing,
            last_seq: None,
            last_clock: 0.0,
            layout,
            scroll_offset: 0.0,
            animation: FollowAnimation::default(),
            reduced_motion: false,
            anchor: cfg.anchor.clamp(0.0, 1.0),
            step_ms: (cfg.sync_step * 1000.0).round() as i64,
            near_window: cfg.near_window,
            follow_duration: Duration::from_millis(cfg.follow_duration_ms),
        }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_line(&self) -> Option<&LyricLine> {
        self.active.and_then(|i| self.lines.get(i))
    }

    pub fn follow_state(&self) -> FollowState {
        self.follow
    }

    pub fn offset_seconds(&self) -> f64 {
        self.offset_ms as f64 / 1000.0
    }

    /// Scroll offset the engine last placed the view at.
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_running()
    }

    /// New source track: fresh lines, fresh clock, back to following.
    pub fn load_track(&mut self, raw: &str) {
        self.animation.cancel();
        self.lines = lyrics::parse(raw);
        self.active = None;
        self.offset_ms = 0;
        self.follow = FollowState::AutoFollowing;
        self.last_seq = None;
        self.last_clock = 0.0;
        self.scroll_offset = 0.0;
        debug!("sync: loaded track, {} lines", self.lines.len());
    }

    /// Edited source text was saved. The clock keeps running, everything
    /// derived from the old text is reset.
    pub fn reparse(&mut self, raw: &str) {
        self.animation.cancel();
        self.lines = lyrics::parse(raw);
        self.active = None;
        self.offset_ms = 0;
        self.follow = FollowState::AutoFollowing;
        debug!("sync: reparsed, {} lines", self.lines.len());
    }

    /// Track closed: nothing may scroll afterwards.
    pub fn close(&mut self) {
        self.animation.cancel();
        self.lines.clear();
        self.active = None;
        self.last_seq = None;
    }

    /// Apply a clock reading. Readings older than the newest applied one are
    /// dropped.
    pub fn tick(&mut self, sample: ClockSample) -> Option<ScrollCommand> {
        if let Some(last) = self.last_seq {
            if sample.seq < last {
                debug!("sync: stale clock #{} < #{}", sample.seq, last);
                return None;
            }
        }
        self.last_seq = Some(sample.seq);
        self.last_clock = sample.seconds;
        self.refresh()
    }

    /// Shift the sync offset by whole steps (positive = lyrics earlier).
    pub fn nudge_offset(&mut self, steps: i32) -> Option<ScrollCommand> {
        self.offset_ms += self.step_ms * i64::from(steps);
        self.refresh()
    }

    /// Manual scroll or touch drag.
    pub fn user_scroll(&mut self) {
        if self.follow == FollowState::AutoFollowing {
            debug!("sync: user override");
            self.follow = FollowState::UserOverridden;
            self.animation.cancel();
        }
    }

    /// Hand scrolling back to the engine and snap to the active line.
    pub fn resume(&mut self) -> Option<ScrollCommand> {
        self.follow = FollowState::AutoFollowing;
        self.follow_active()
    }

    /// A line was picked: returns its time for the transport to seek to and
    /// resumes following.
    pub fn seek_to_line(&mut self, index: usize) -> Option<f64> {
        let time = self.lines.get(index)?.time;
        self.follow = FollowState::AutoFollowing;
        Some(time)
    }

    pub fn resize(&mut self, layout: FollowLayout) -> Option<ScrollCommand> {
        self.layout = layout;
        self.follow_active()
    }

    /// Advisory from the frame monitor: jump instead of easing.
    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.reduced_motion = reduced;
        if reduced && self.animation.is_running() {
            self.scroll_offset = self.animation.target();
            self.animation.cancel();
        }
    }

    /// Advance the follow animation by one frame.
    pub fn frame(&mut self, dt: Duration) -> Option<f64> {
        let offset = self.animation.advance(dt)?;
        self.scroll_offset = offset;
        Some(offset)
    }

    /// Scroll offset that holds line `index` at the anchor fraction.
    pub fn target_for(&self, index: usize) -> f64 {
        let line = self.layout.line_extent;
        let top = index as f64 * line;
        (top + line / 2.0 - self.layout.viewport_extent * self.anchor).max(0.0)
    }

    pub fn emphasis(&self, index: usize) -> Emphasis {
        match self.active {
            Some(a) if a == index => Emphasis::Active,
            Some(a) if a.abs_diff(index) <= self.near_window => Emphasis::Near,
            Some(a) if index < a => Emphasis::Past,
            _ => Emphasis::Upcoming,
        }
    }

    fn refresh(&mut self) -> Option<ScrollCommand> {
        let next = resolve_active_index(&self.lines, self.last_clock, self.offset_seconds());
        if next == self.active {
            return None;
        }
        self.active = next;
        self.follow_active()
    }

    fn follow_active(&mut self) -> Option<ScrollCommand> {
        if self.follow != FollowState::AutoFollowing {
            return None;
        }
        let index = self.active?;
        let target = self.target_for(index);
        let smooth = !self.reduced_motion;
        if smooth {
            self.animation
                .start(self.scroll_offset, target, self.follow_duration);
        } else {
            self.animation.cancel();
            self.scroll_offset = target;
        }
        Some(ScrollCommand { target, smooth })
    }
}
