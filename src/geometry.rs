//! World-space geometry primitives shared by the proximity detector and
//! composite flow layout.
//!
//! All coordinates are f32 world units. Rects are axis-aligned with the
//! origin at the top-left, so `bottom()` and `right()` grow positive.

/// Layout axis of a composite or sub-group.
///
/// `Row` flows members left-to-right, `Column` top-to-bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

impl Axis {
    /// The perpendicular axis (row ↔ column).
    pub fn perpendicular(self) -> Axis {
        match self {
            Axis::Row => Axis::Column,
            Axis::Column => Axis::Row,
        }
    }
}

/// Axis-aligned rectangle in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Top-left corner.
    pub fn origin(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Returns the rect repositioned at the given origin, keeping its size.
    pub fn at(&self, x: f32, y: f32) -> Rect {
        Rect::new(x, y, self.width, self.height)
    }

    /// Extent along the given axis: width for `Row`, height for `Column`.
    pub fn extent(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Row => self.width,
            Axis::Column => self.height,
        }
    }

    /// Smallest rect covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Length of the interval overlap between the two rects along `axis`.
    ///
    /// Zero when the projections do not overlap.
    pub fn overlap_on(&self, other: &Rect, axis: Axis) -> f32 {
        let (a0, a1, b0, b1) = match axis {
            Axis::Row => (self.x, self.right(), other.x, other.right()),
            Axis::Column => (self.y, self.bottom(), other.y, other.bottom()),
        };
        (a1.min(b1) - a0.max(b0)).max(0.0)
    }

    /// Overlap along `axis` as a fraction of the smaller extent.
    ///
    /// This is the alignment measure used for meld gating: two rects count
    /// as aligned when the fraction reaches the configured minimum.
    pub fn alignment_fraction(&self, other: &Rect, axis: Axis) -> f32 {
        let min_extent = self.extent(axis).min(other.extent(axis));
        if min_extent <= 0.0 {
            return 0.0;
        }
        self.overlap_on(other, axis) / min_extent
    }
}
