//! Redraw coalescing for the interactive loop.
//!
//! `ViewState` operations (`handle_text`, `set_selected`, `set_overlay`, ...) each
//! report what changed via `mark`. The input loop calls `consume` once per idle
//! tick and gets back a single merged `Decision` describing the minimal repaint
//! the (out-of-scope) widget tree needs to perform — collapsing N calls to
//! `queue_redraw` within one tick into a single request, per the concurrency
//! model's redraw-collapsing guarantee.
//!
//! Merge semantics:
//! - If any `Full` is present in the queue, the semantic decision is `Full`.
//! - Multiple `Rows` deltas merge into a single half-open range covering the
//!   min start to the max end: `[min(start), max(end))`.
//! - Multiple `Scroll` deltas coalesce into one, keeping the first observed
//!   `old_first` and the latest `new_first`.
//! - Precedence: `Scroll` > `Rows` > `Overlay` > `CursorOnly`.
//! - `CursorOnly` with `Overlay` collapses to `Overlay` (unless `Rows`/`Scroll`
//!   are also present).

/// Granular render invalidation intents produced by `ViewState` mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDelta {
    /// Entire overlay must be repainted (mode switch, reload, resize).
    Full,
    /// Entry rows confined to a (filtered-view) index span changed.
    Rows(std::ops::Range<usize>),
    /// The visible window over the filtered list scrolled.
    Scroll { old_first: usize, new_first: usize },
    /// Only the overlay/message label changed.
    Overlay,
    /// Only the input-box cursor moved, text unchanged.
    CursorOnly,
}

#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: Vec<RenderDelta>,
    metrics: RenderDeltaMetrics,
}

/// Decision handed to the caller after a coalescing pass.
///
/// `semantic` is the merged minimal damage kind; `effective` is what the
/// engine should actually execute (may escalate to `Full`, e.g. a scroll
/// larger than `RenderScheduler::SCROLL_SHIFT_MAX`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub semantic: RenderDelta,
    pub effective: RenderDelta,
}

#[derive(Debug, Default)]
pub struct RenderDeltaMetrics {
    full: std::sync::atomic::AtomicU64,
    rows: std::sync::atomic::AtomicU64,
    scroll: std::sync::atomic::AtomicU64,
    overlay: std::sync::atomic::AtomicU64,
    cursor_only: std::sync::atomic::AtomicU64,
    collapsed_scroll: std::sync::atomic::AtomicU64,
    suppressed_rows: std::sync::atomic::AtomicU64,
    frames: std::sync::atomic::AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderDeltaMetricsSnapshot {
    pub full: u64,
    pub rows: u64,
    pub scroll: u64,
    pub overlay: u64,
    pub cursor_only: u64,
    pub collapsed_scroll: u64,
    pub suppressed_rows: u64,
    pub frames: u64,
}

impl RenderDeltaMetrics {
    pub fn snapshot(&self) -> RenderDeltaMetricsSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        RenderDeltaMetricsSnapshot {
            full: self.full.load(Relaxed),
            rows: self.rows.load(Relaxed),
            scroll: self.scroll.load(Relaxed),
            overlay: self.overlay.load(Relaxed),
            cursor_only: self.cursor_only.load(Relaxed),
            collapsed_scroll: self.collapsed_scroll.load(Relaxed),
            suppressed_rows: self.suppressed_rows.load(Relaxed),
            frames: self.frames.load(Relaxed),
        }
    }
    fn incr_semantic(&self, delta: &RenderDelta) {
        use std::sync::atomic::Ordering::Relaxed;
        match delta {
            RenderDelta::Full => self.full.fetch_add(1, Relaxed),
            RenderDelta::Rows(_) => self.rows.fetch_add(1, Relaxed),
            RenderDelta::Scroll { .. } => self.scroll.fetch_add(1, Relaxed),
            RenderDelta::Overlay => self.overlay.fetch_add(1, Relaxed),
            RenderDelta::CursorOnly => self.cursor_only.fetch_add(1, Relaxed),
        };
    }
    fn incr_collapsed_scroll(&self) {
        self.collapsed_scroll
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
    fn incr_suppressed_rows(&self) {
        self.suppressed_rows
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
    fn incr_frame(&self) {
        self.frames.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            metrics: RenderDeltaMetrics::default(),
        }
    }

    /// Scrolls larger than this many rows escalate to a full repaint rather
    /// than a scroll-region shift: the shift would cost close to a full
    /// repaint anyway once this many entering rows must be redrawn.
    pub const SCROLL_SHIFT_MAX: usize = 12;

    pub fn metrics_snapshot(&self) -> RenderDeltaMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Record a new delta. Multiple calls accumulate until `consume()`.
    pub fn mark(&mut self, delta: RenderDelta) {
        tracing::trace!(target: "render.scheduler", ?delta, "render_mark");
        self.pending.push(delta);
    }

    pub fn mark_overlay(&mut self) {
        self.mark(RenderDelta::Overlay);
    }

    /// Collapse queued deltas since the last call and return a `Decision`,
    /// or `None` if nothing was marked (no redraw needed this tick).
    pub fn consume(&mut self) -> Option<Decision> {
        if self.pending.is_empty() {
            return None;
        }
        let merged = self.collapse();
        tracing::trace!(target: "render.scheduler", ?merged, "render_delta_collapse");
        self.pending.clear();
        self.metrics.incr_semantic(&merged);
        self.metrics.incr_frame();
        let effective = match &merged {
            RenderDelta::CursorOnly => RenderDelta::CursorOnly,
            RenderDelta::Overlay => RenderDelta::Overlay,
            RenderDelta::Rows(r) => RenderDelta::Rows(r.clone()),
            RenderDelta::Scroll {
                old_first,
                new_first,
            } => {
                let diff = new_first.abs_diff(*old_first);
                if diff <= Self::SCROLL_SHIFT_MAX {
                    RenderDelta::Scroll {
                        old_first: *old_first,
                        new_first: *new_first,
                    }
                } else {
                    RenderDelta::Full
                }
            }
            RenderDelta::Full => RenderDelta::Full,
        };
        Some(Decision {
            semantic: merged,
            effective,
        })
    }

    fn collapse(&self) -> RenderDelta {
        if self.pending.iter().any(|d| matches!(d, RenderDelta::Full)) {
            return RenderDelta::Full;
        }
        let mut have_overlay = false;
        let mut have_cursor = false;
        let mut row_range: Option<std::ops::Range<usize>> = None;
        let mut scroll_old_first: Option<usize> = None;
        let mut scroll_new_first: Option<usize> = None;
        let mut scroll_events = 0usize;
        for d in &self.pending {
            match d {
                RenderDelta::Full => return RenderDelta::Full,
                RenderDelta::Overlay => have_overlay = true,
                RenderDelta::CursorOnly => have_cursor = true,
                RenderDelta::Rows(r) => {
                    row_range = Some(match row_range.take() {
                        None => r.clone(),
                        Some(existing) => existing.start.min(r.start)..existing.end.max(r.end),
                    });
                }
                RenderDelta::Scroll {
                    old_first,
                    new_first,
                } => {
                    scroll_events += 1;
                    if scroll_old_first.is_none() {
                        scroll_old_first = Some(*old_first);
                    }
                    scroll_new_first = Some(*new_first);
                }
            }
        }
        if let (Some(of), Some(nf)) = (scroll_old_first, scroll_new_first) {
            for _ in 1..scroll_events {
                self.metrics.incr_collapsed_scroll();
            }
            if row_range.is_some() {
                self.metrics.incr_suppressed_rows();
            }
            return RenderDelta::Scroll {
                old_first: of,
                new_first: nf,
            };
        }
        if let Some(r) = row_range {
            return RenderDelta::Rows(r);
        }
        if have_overlay {
            return RenderDelta::Overlay;
        }
        if have_cursor {
            return RenderDelta::CursorOnly;
        }
        RenderDelta::Full
    }
}
