// Promptdock Geometry Primitives
// Screen-space points and rectangles shared by the locator, resolver and sequencer

use serde::{Deserialize, Serialize};

/// An absolute screen coordinate in pixels.
///
/// Coordinates are signed because multi-monitor layouts can place
/// windows at negative offsets relative to the primary monitor origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate this point by an offset vector.
    pub fn offset_by(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned screen rectangle (origin plus size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two corner points in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            width: (a.x - b.x).unsigned_abs(),
            height: (a.y - b.y).unsigned_abs(),
        }
    }

    /// Geometric center of the rectangle.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + (self.width / 2) as i32,
            y: self.y + (self.height / 2) as i32,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && p.x < self.x + self.width as i32
            && p.y < self.y + self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_offset() {
        let p = Point::new(500, 300).offset_by(0, -45);
        assert_eq!(p, Point::new(500, 255));
    }

    #[test]
    fn test_rect_from_corners_any_order() {
        let a = Rect::from_corners(Point::new(10, 20), Point::new(30, 60));
        let b = Rect::from_corners(Point::new(30, 60), Point::new(10, 20));
        assert_eq!(a, b);
        assert_eq!(a, Rect::new(10, 20, 20, 40));
    }

    #[test]
    fn test_rect_center() {
        let r = Rect::new(100, 200, 40, 10);
        assert_eq!(r.center(), Point::new(120, 205));
    }

    #[test]
    fn test_rect_contains_edges() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains(Point::new(0, 0)));
        assert!(r.contains(Point::new(9, 9)));
        assert!(!r.contains(Point::new(10, 10)));
        assert!(!r.contains(Point::new(-1, 5)));
    }
}
