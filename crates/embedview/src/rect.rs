//! Placement of the browsing surface inside the parent window.

use serde::{Deserialize, Serialize};

/// A rectangle in window client coordinates, given as origin and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebviewRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Edge coordinates as the platform controller expects them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WebviewRect {
    #[must_use]
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Coerce a zero width or height to 1, pinning that axis to the origin.
    ///
    /// Only zero is coerced; negative sizes pass through untouched.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut rect = self;
        if rect.width == 0 {
            rect.left = 0;
            rect.width = 1;
        }
        if rect.height == 0 {
            rect.top = 0;
            rect.height = 1;
        }
        rect
    }

    /// Edge coordinates of the normalized rectangle.
    #[must_use]
    pub fn to_bounds(self) -> Bounds {
        let rect = self.normalized();
        Bounds {
            left: rect.left,
            top: rect.top,
            right: rect.left.saturating_add(rect.width),
            bottom: rect.top.saturating_add(rect.height),
        }
    }
}

impl Bounds {
    #[must_use]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_width_pins_left() {
        let rect = WebviewRect::new(40, 10, 0, 300).normalized();
        assert_eq!(rect, WebviewRect::new(0, 10, 1, 300));
    }

    #[test]
    fn test_zero_height_pins_top() {
        let rect = WebviewRect::new(40, 10, 200, 0).normalized();
        assert_eq!(rect, WebviewRect::new(40, 0, 200, 1));
    }

    #[test]
    fn test_zero_both_axes() {
        let rect = WebviewRect::new(-5, 7, 0, 0).normalized();
        assert_eq!(rect, WebviewRect::new(0, 0, 1, 1));
    }

    #[test]
    fn test_non_degenerate_untouched() {
        let rect = WebviewRect::new(3, 4, 640, 480);
        assert_eq!(rect.normalized(), rect);

        // negative sizes are not coerced
        let negative = WebviewRect::new(3, 4, -10, 480);
        assert_eq!(negative.normalized(), negative);
    }

    #[test]
    fn test_to_bounds() {
        let bounds = WebviewRect::new(10, 20, 300, 200).to_bounds();
        assert_eq!(
            bounds,
            Bounds {
                left: 10,
                top: 20,
                right: 310,
                bottom: 220,
            }
        );
        assert_eq!(bounds.width(), 300);
        assert_eq!(bounds.height(), 200);
    }

    #[test]
    fn test_to_bounds_normalizes_first() {
        let bounds = WebviewRect::new(10, 20, 0, 0).to_bounds();
        assert_eq!(
            bounds,
            Bounds {
                left: 0,
                top: 0,
                right: 1,
                bottom: 1,
            }
        );
    }

    #[test]
    fn test_to_bounds_saturates() {
        let bounds = WebviewRect::new(i32::MAX - 1, 0, 10, 10).to_bounds();
        assert_eq!(bounds.right, i32::MAX);
    }
}
