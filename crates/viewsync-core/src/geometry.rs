//! Basic geometric types for laid out diagrams.

use serde::{Deserialize, Serialize};

/// A 2D point in diagram coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x coordinate.
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y coordinate.
    pub fn y(self) -> f32 {
        self.y
    }

    /// Returns the point halfway between `self` and `other`.
    pub fn midpoint(self, other: Point) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    /// Creates a new size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns the width.
    pub fn width(self) -> f32 {
        self.width
    }

    /// Returns the height.
    pub fn height(self) -> f32 {
        self.height
    }

    /// Returns the component-wise maximum of two sizes.
    pub fn max(self, other: Size) -> Self {
        Self::new(self.width.max(other.width), self.height.max(other.height))
    }
}

/// An axis-aligned rectangle described by its top-left corner and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min: Point,
    size: Size,
}

impl Bounds {
    /// Creates bounds anchored at `top_left`.
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min: top_left,
            size,
        }
    }

    /// Returns the top-left corner.
    pub fn min_point(self) -> Point {
        self.min
    }

    /// Returns the size of the rectangle.
    pub fn to_size(self) -> Size {
        self.size
    }

    /// Returns the right edge.
    pub fn max_x(self) -> f32 {
        self.min.x() + self.size.width()
    }

    /// Returns the bottom edge.
    pub fn max_y(self) -> f32 {
        self.min.y() + self.size.height()
    }

    /// Returns the center of the rectangle.
    pub fn center(self) -> Point {
        Point::new(
            self.min.x() + self.size.width() / 2.0,
            self.min.y() + self.size.height() / 2.0,
        )
    }
}
