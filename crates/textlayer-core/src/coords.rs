//! Coordinate transformation between PDF user space, page space and raster pixels
//!
//! Page space has its origin at the top-left corner of the displayed page
//! with y growing downward. User space is the PDF's own bottom-left system
//! before `/Rotate` is applied.

use crate::model::{PageGeometry, PixelBox, Point, Rect};

/// Maps unrotated PDF user space onto the displayed page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    /// Effective box `[x0, y0, x1, y1]` in user space
    bbox: [f64; 4],
    /// Clockwise rotation, one of 0, 90, 180, 270
    rotation: u16,
}

impl PageTransform {
    pub fn new(bbox: [f64; 4], rotation: i64) -> Self {
        let [a, b, c, d] = bbox;
        Self {
            bbox: [a.min(c), b.min(d), a.max(c), b.max(d)],
            rotation: normalize_rotation(rotation),
        }
    }

    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    fn box_size(&self) -> (f64, f64) {
        let [x0, y0, x1, y1] = self.bbox;
        (x1 - x0, y1 - y0)
    }

    pub fn geometry(&self) -> PageGeometry {
        let (width, height) = self.box_size();
        match self.rotation {
            90 | 270 => PageGeometry::new(height, width),
            _ => PageGeometry::new(width, height),
        }
    }

    /// User-space point to page space
    pub fn to_page(&self, ux: f64, uy: f64) -> Point {
        let [x0, _, _, y1] = self.bbox;
        let (width, height) = self.box_size();

        // Unrotated, top-left origin
        let px = ux - x0;
        let py = y1 - uy;

        match self.rotation {
            90 => Point::new(height - py, px),
            180 => Point::new(width - px, height - py),
            270 => Point::new(py, width - px),
            _ => Point::new(px, py),
        }
    }

    /// Page-space rectangle covering the user-space rectangle
    pub fn rect_to_page(&self, ux0: f64, uy0: f64, ux1: f64, uy1: f64) -> Rect {
        let a = self.to_page(ux0, uy0);
        let b = self.to_page(ux1, uy1);
        Rect::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }
}

/// Fold any multiple of 90 into `0..360`; other values are treated as 0
pub fn normalize_rotation(rotation: i64) -> u16 {
    let folded = rotation.rem_euclid(360);
    if folded % 90 == 0 {
        folded as u16
    } else {
        0
    }
}

/// Page-space y to output user-space y for a page of the given height
pub fn page_to_user_y(y: f64, page_height: f64) -> f64 {
    page_height - y
}

/// Independent horizontal and vertical pixel → point factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub sx: f64,
    pub sy: f64,
}

impl PixelScale {
    /// `None` when the image has a zero dimension
    pub fn new(page: &PageGeometry, image_width: u32, image_height: u32) -> Option<Self> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        Some(Self {
            sx: page.width / f64::from(image_width),
            sy: page.height / f64::from(image_height),
        })
    }

    pub fn map(&self, pixels: &PixelBox) -> Rect {
        Rect::from_xywh(
            pixels.left * self.sx,
            pixels.top * self.sy,
            pixels.width * self.sx,
            pixels.height * self.sy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_unrotated_flips_y() {
        let t = PageTransform::new(LETTER, 0);
        assert_eq!(t.to_page(72.0, 720.0), Point::new(72.0, 72.0));
        assert_eq!(t.geometry(), PageGeometry::new(612.0, 792.0));
    }

    #[test]
    fn test_offset_box() {
        let t = PageTransform::new([10.0, 20.0, 110.0, 220.0], 0);
        assert_eq!(t.to_page(10.0, 220.0), Point::new(0.0, 0.0));
        assert_eq!(t.to_page(110.0, 20.0), Point::new(100.0, 200.0));
    }

    #[test]
    fn test_rotated_corners() {
        // Top-left of the unrotated page, in user space
        let (ux, uy) = (0.0, 792.0);

        let t90 = PageTransform::new(LETTER, 90);
        assert_eq!(t90.geometry(), PageGeometry::new(792.0, 612.0));
        assert!(close(t90.to_page(ux, uy), Point::new(792.0, 0.0)));

        let t180 = PageTransform::new(LETTER, 180);
        assert!(close(t180.to_page(ux, uy), Point::new(612.0, 792.0)));

        let t270 = PageTransform::new(LETTER, -90);
        assert_eq!(t270.rotation(), 270);
        assert!(close(t270.to_page(ux, uy), Point::new(0.0, 612.0)));
    }

    #[test]
    fn test_rect_normalized_under_rotation() {
        let t = PageTransform::new(LETTER, 180);
        let rect = t.rect_to_page(0.0, 0.0, 100.0, 10.0);
        assert!(rect.x0 < rect.x1 && rect.y0 < rect.y1);
        assert_eq!(rect, Rect::new(512.0, 0.0, 612.0, 10.0));
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-180), 180);
        assert_eq!(normalize_rotation(45), 0);
    }

    #[test]
    fn test_pixel_scale_maps_box() {
        let scale = PixelScale::new(&PageGeometry::new(500.0, 700.0), 1000, 1400).unwrap();
        let rect = scale.map(&PixelBox {
            left: 100.0,
            top: 200.0,
            width: 50.0,
            height: 30.0,
        });
        assert_eq!(rect, Rect::from_xywh(50.0, 100.0, 25.0, 15.0));
    }

    #[test]
    fn test_pixel_scale_independent_axes() {
        let scale = PixelScale::new(&PageGeometry::new(600.0, 800.0), 1200, 400).unwrap();
        assert_eq!(scale, PixelScale { sx: 0.5, sy: 2.0 });
    }

    #[test]
    fn test_pixel_scale_zero_image() {
        assert!(PixelScale::new(&PageGeometry::new(1.0, 1.0), 0, 10).is_none());
    }

    #[test]
    fn test_page_to_user_y() {
        assert_eq!(page_to_user_y(72.0, 792.0), 720.0);
    }
}
