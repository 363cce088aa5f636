//! Redraw-coalescing support for the interactive view loop.
//!
//! The actual pixel/cell painting, theme resolution and widget layout are an
//! external collaborator (the Display/Widget-tree abstraction) and live
//! outside this workspace. What lives here is the bookkeeping that decides
//! *when* a repaint is warranted and how much of it actually changed, so the
//! input loop can collapse a burst of `ViewState` mutations into one redraw
//! request per idle tick.

pub mod scheduler;

pub use scheduler::{Decision, RenderDelta, RenderDeltaMetricsSnapshot, RenderScheduler};
