//! Frame budget monitor.
//!
//! The host reports every rendered frame; once per second the monitor turns
//! the count into an fps sample, pushes it to subscribers and flips an
//! edge-triggered degraded flag when throughput drops below the budget.
//! A background thread samples process memory alongside.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorError;

const WINDOW: Duration = Duration::from_secs(1);
const NO_MEMORY: u64 = u64::MAX;

/// When a degraded monitor may report recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Once degraded, stay degraded for the life of the monitor.
    #[default]
    Sticky,
    /// Restore after `sustain` consecutive samples above `restore_above`.
    Hysteresis { restore_above: u32, sustain: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSample {
    pub fps: u32,
    pub degraded: bool,
    /// Resident memory of this process, if the sampler has a reading yet.
    pub memory_mb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    Sample(PerformanceSample),
    Degraded(PerformanceSample),
    Restored(PerformanceSample),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Degraded,
    Restored,
}

// ── Degrade tracker ─────────────────────────────────────────────────────

/// The degraded flag and its transitions, without any clock.
#[derive(Debug, Clone)]
pub struct DegradeTracker {
    degrade_below: u32,
    policy: RecoveryPolicy,
    degraded: bool,
    streak: u32,
}

impl DegradeTracker {
    pub fn new(degrade_below: u32, policy: RecoveryPolicy) -> Self {
        DegradeTracker {
            degrade_below,
            policy,
            degraded: false,
            streak: 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Feed one fps sample; returns the transition it caused, if any.
    pub fn observe(&mut self, fps: u32) -> Option<Transition> {
        if !self.degraded {
            if fps < self.degrade_below {
                self.degraded = true;
                self.streak = 0;
                return Some(Transition::Degraded);
            }
            return None;
        }
        match self.policy {
            RecoveryPolicy::Sticky => None,
            RecoveryPolicy::Hysteresis {
                restore_above,
                sustain,
            } => {
                if fps > restore_above {
                    self.streak += 1;
                } else {
                    self.streak = 0;
                }
                if self.streak >= sustain.max(1) {
                    self.degraded = false;
                    self.streak = 0;
                    Some(Transition::Restored)
                } else {
                    None
                }
            }
        }
    }
}

// ── Subscribers ─────────────────────────────────────────────────────────

type Callback = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(u64, Callback)>,
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subs) = self.subscribers.upgrade() {
            if let Ok(mut subs) = subs.lock() {
                subs.list.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

// ── Memory sampler ──────────────────────────────────────────────────────

struct Sampler {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

fn spawn_sampler(
    interval: Duration,
    budget_mb: u64,
    memory: Arc<AtomicU64>,
) -> Result<Sampler, MonitorError> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name("mem-sampler".into())
        .spawn(move || {
            let pid = match sysinfo::get_current_pid() {
                Ok(pid) => pid,
                Err(e) => {
                    warn!("monitor: no pid for memory sampling: {}", e);
                    return;
                }
            };
            let mut sys = System::new();
            let mut over = false;
            loop {
                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_memory(),
                );
                if let Some(process) = sys.process(pid) {
                    let mb = process.memory() / (1024 * 1024);
                    memory.store(mb, Ordering::Relaxed);
                    let now_over = mb > budget_mb;
                    if now_over && !over {
                        warn!("monitor: memory {} MB over budget {} MB", mb, budget_mb);
                    }
                    over = now_over;
                }
                // a message or a dropped sender both mean stop
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
            debug!("monitor: memory sampler stopped");
        })
        .map_err(MonitorError::Spawn)?;
    Ok(Sampler { stop_tx, thread })
}

// ── Monitor ─────────────────────────────────────────────────────────────

pub struct FrameBudgetMonitor {
    config: MonitorConfig,
    tracker: DegradeTracker,
    subscribers: Arc<Mutex<Subscribers>>,
    running: bool,
    window_start: Option<Instant>,
    frames: u32,
    memory_mb: Arc<AtomicU64>,
    sampler: Option<Sampler>,
}

impl FrameBudgetMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let tracker = DegradeTracker::new(config.degrade_below, config.recovery);
        FrameBudgetMonitor {
            config,
            tracker,
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            running: false,
            window_start: None,
            frames: 0,
            memory_mb: Arc::new(AtomicU64::new(NO_MEMORY)),
            sampler: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_degraded(&self) -> bool {
        self.tracker.is_degraded()
    }

    pub fn memory_mb(&self) -> Option<u64> {
        match self.memory_mb.load(Ordering::Relaxed) {
            NO_MEMORY => None,
            mb => Some(mb),
        }
    }

    /// Begin sampling. Idempotent while running. A zero sample interval
    /// disables the memory sampler.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.running {
            return Ok(());
        }
        if self.config.sample_interval_ms > 0 {
            self.sampler = Some(spawn_sampler(
                Duration::from_millis(self.config.sample_interval_ms),
                self.config.memory_budget_mb,
                self.memory_mb.clone(),
            )?);
        }
        self.running = true;
        self.window_start = None;
        self.frames = 0;
        info!(
            "monitor: started (degrade below {} fps, {:?})",
            self.config.degrade_below, self.config.recovery
        );
        Ok(())
    }

    /// Stop frame sampling and join the memory sampler. No callback fires
    /// after this returns.
    pub fn stop(&mut self) {
        if !self.running && self.sampler.is_none() {
            return;
        }
        self.running = false;
        if let Some(sampler) = self.sampler.take() {
            sampler.stop_tx.send(()).ok();
            sampler.thread.join().ok();
        }
        debug!("monitor: stopped");
    }

    /// Register a callback for every sample and transition.
    ///
    /// Callbacks run on the thread that reports frames, outside the
    /// subscriber lock, so they may subscribe or drop subscriptions.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        let mut id = 0;
        if let Ok(mut subs) = self.subscribers.lock() {
            id = subs.next_id;
            subs.next_id += 1;
            subs.list.push((id, Arc::new(callback)));
        }
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn frame(&mut self) {
        self.frame_at(Instant::now());
    }

    /// Report a frame rendered at `now`. The first frame after `start` opens
    /// the window; the first frame a second or more later closes it, and the
    /// sample is the number of frames counted in it, closing frame included.
    pub fn frame_at(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        self.frames += 1;
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        if now.saturating_duration_since(start) < WINDOW {
            return;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = Some(now);
        self.record(fps);
    }

    /// Push one already-measured fps sample through the degrade logic.
    pub fn record(&mut self, fps: u32) {
        if !self.running {
            return;
        }
        let transition = self.tracker.observe(fps);
        let sample = PerformanceSample {
            fps,
            degraded: self.tracker.is_degraded(),
            memory_mb: self.memory_mb(),
        };
        self.emit(MonitorEvent::Sample(sample));
        match transition {
            Some(Transition::Degraded) => {
                warn!(
                    "monitor: degraded at {} fps (budget {})",
                    fps, self.config.degrade_below
                );
                self.emit(MonitorEvent::Degraded(sample));
            }
            Some(Transition::Restored) => {
                info!("monitor: restored at {} fps", fps);
                self.emit(MonitorEvent::Restored(sample));
            }
            None => {}
        }
    }

    fn emit(&self, event: MonitorEvent) {
        let callbacks: Vec<Callback> = match self.subscribers.lock() {
            Ok(subs) => subs.list.iter().map(|(_, cb)| cb.clone()).collect(),
            Err(_) => return,
        };
        for cb in callbacks {
            cb(&event);
        }
    }
}

impl Drop for FrameBudgetMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
