//! Geometric primitives for boundary detection.
//!
//! A feed tracks two rectangles in the same coordinate space: the bounds
//! of the scrollable content being monitored, and the container it scrolls
//! inside (origin normalized to (0, 0)). The boundary detector only cares
//! about positions along the vertical axis, so [`Rect`] exposes `min_y` /
//! `max_y` plus the direction-dependent [`Rect::edge_position`].

/// Which edge of the feed triggers pagination, and on which side merged
/// pages are inserted. Fixed per controller instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The feed grows at the top; new pages are prepended.
    Upward,
    /// The feed grows at the bottom; new pages are appended.
    Downward,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    #[inline]
    pub fn min_y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Position of the pagination-relevant edge: `min_y` for upward feeds,
    /// `max_y` for downward feeds.
    #[inline]
    pub fn edge_position(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Upward => self.min_y(),
            Direction::Downward => self.max_y(),
        }
    }

    /// Malformed geometry the detector must refuse to act on: NaN
    /// coordinates or negative extents.
    pub fn is_degenerate(&self) -> bool {
        self.x.is_nan()
            || self.y.is_nan()
            || self.width.is_nan()
            || self.height.is_nan()
            || self.width < 0.0
            || self.height < 0.0
    }
}

/// True iff the tracked content changed height between two samples.
///
/// Exact comparison on purpose: a page landing in the list visibly changes
/// the content height, and that frame delta must never be read as user
/// scroll.
#[inline]
pub fn height_changed(old: &Rect, new: &Rect) -> bool {
    old.height != new.height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_position_follows_direction() {
        let rect = Rect::new(0.0, 10.0, 100.0, 50.0);
        assert_eq!(rect.edge_position(Direction::Upward), 10.0);
        assert_eq!(rect.edge_position(Direction::Downward), 60.0);
    }

    #[test]
    fn test_height_changed_is_exact() {
        let old = Rect::new(0.0, 0.0, 100.0, 500.0);
        assert!(!height_changed(&old, &old));
        assert!(height_changed(
            &old,
            &Rect::new(0.0, 0.0, 100.0, 500.001)
        ));
        // Origin movement alone is not a height change.
        assert!(!height_changed(&old, &Rect::new(0.0, -40.0, 100.0, 500.0)));
    }

    #[test]
    fn test_degenerate_rects() {
        assert!(!Rect::ZERO.is_degenerate());
        assert!(Rect::new(f32::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(Rect::new(0.0, 0.0, -1.0, 1.0).is_degenerate());
        assert!(Rect::new(0.0, 0.0, 1.0, f32::NAN).is_degenerate());
    }
}
