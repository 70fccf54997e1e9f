//! Boundary detection for infinite-scroll pagination.
//!
//! The detector is a pure function over two geometry samples of the
//! tracked content plus the current loading state. It has to separate
//! three things that all look like "the frame moved": genuine user scroll
//! toward the paginating edge, a content-size change caused by a page that
//! just merged, and a momentum bounce in the opposite sense. Only the
//! first may start a fetch.

use crate::geometry::{height_changed, Direction, Rect};

/// Margin that fires the trigger slightly before the literal edge,
/// absorbing layout and floating-point jitter.
pub const DEFAULT_EDGE_THRESHOLD: f32 = 5.0;

/// Tuning knobs for the boundary detector.
#[derive(Clone, Copy, Debug)]
pub struct PaginationConfig {
    /// Distance from the container edge at which pagination fires.
    pub threshold: f32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_EDGE_THRESHOLD,
        }
    }
}

impl PaginationConfig {
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }
}

/// Decides whether a pagination fetch should start.
///
/// `old` and `new` are consecutive samples of the tracked content's frame
/// in the container's coordinate space; `container` is the container's own
/// bounds with origin at (0, 0). Returns `false` unless every condition
/// holds:
///
/// 1. no fetch is outstanding (`is_loading` is the single-flight guard);
/// 2. the content height is unchanged between samples, so the delta is
///    scroll rather than content growth;
/// 3. the edge movement matches the configured direction (upward feeds
///    require `new.min_y - old.min_y <= 0`, downward feeds require
///    `new.max_y - old.max_y >= 0`), rejecting bounce-back scrolls;
/// 4. the tracked edge has crossed the container edge by more than
///    `threshold`.
///
/// Never panics: degenerate geometry (NaN, negative extents) yields
/// `false`, and identical samples fail condition 4 by construction.
pub fn should_trigger_fetch(
    old: Rect,
    new: Rect,
    container: Rect,
    direction: Direction,
    is_loading: bool,
    threshold: f32,
) -> bool {
    if is_loading {
        return false;
    }

    if old.is_degenerate() || new.is_degenerate() || container.is_degenerate() {
        log::debug!(
            "boundary: ignoring degenerate geometry sample old={old:?} new={new:?} container={container:?}"
        );
        return false;
    }

    if height_changed(&old, &new) {
        return false;
    }

    let edge_delta = new.edge_position(direction) - old.edge_position(direction);
    let toward_configured_edge = match direction {
        Direction::Upward => edge_delta <= 0.0,
        Direction::Downward => edge_delta >= 0.0,
    };
    if !toward_configured_edge {
        return false;
    }

    // NaN never compares true, so a NaN threshold also refuses to trigger.
    match direction {
        Direction::Upward => new.min_y() > container.min_y() + threshold,
        Direction::Downward => new.max_y() < container.max_y() - threshold,
    }
}
