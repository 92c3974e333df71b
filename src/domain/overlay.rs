//! Annotation overlay model
//!
//! The authoritative coordinate space for any annotation is the source
//! media's native pixel dimensions at capture time. The overlay surface is
//! resized to those exact dimensions before drawing, every capture; stale
//! boxes from a prior capture are cleared first.

use serde::Deserialize;

/// Axis-aligned bounding box in source-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Box width in pixels
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Box height in pixels
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// Transparent annotation surface spatially registered to the source video's
/// native resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    width: u32,
    height: u32,
    boxes: Vec<BoundingBox>,
}

impl Overlay {
    /// Create an empty, zero-sized overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Registered boxes, in response order
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// Whether no boxes are currently drawn
    pub fn is_clear(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Resize the surface to exactly the given native dimensions, clear any
    /// stale boxes, then register the new ones. A response without boxes
    /// therefore produces a cleared overlay, never a retained old one.
    pub fn reconcile(&mut self, width: u32, height: u32, boxes: &[BoundingBox]) {
        self.width = width;
        self.height = height;
        self.boxes.clear();
        self.boxes.extend_from_slice(boxes);
    }

    /// Clear all boxes without touching dimensions
    pub fn clear(&mut self) {
        self.boxes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_sets_exact_dimensions() {
        let mut overlay = Overlay::new();
        overlay.reconcile(640, 480, &[]);
        assert_eq!(overlay.dimensions(), (640, 480));

        // Dimensions never carry over from a previous capture
        overlay.reconcile(1920, 1080, &[]);
        assert_eq!(overlay.dimensions(), (1920, 1080));
    }

    #[test]
    fn reconcile_clears_stale_boxes() {
        let mut overlay = Overlay::new();
        let old = BoundingBox {
            x1: 1.0,
            y1: 1.0,
            x2: 5.0,
            y2: 5.0,
        };
        overlay.reconcile(640, 480, &[old]);
        assert_eq!(overlay.boxes().len(), 1);

        // A box-less response clears rather than retains
        overlay.reconcile(640, 480, &[]);
        assert!(overlay.is_clear());
    }

    #[test]
    fn reconcile_registers_boxes_in_order() {
        let mut overlay = Overlay::new();
        let a = BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 50.0,
        };
        let b = BoundingBox {
            x1: 60.0,
            y1: 20.0,
            x2: 90.0,
            y2: 70.0,
        };
        overlay.reconcile(1280, 720, &[a, b]);
        assert_eq!(overlay.boxes(), &[a, b]);
    }

    #[test]
    fn box_extents() {
        let b = BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 30.0,
        };
        assert_eq!(b.width(), 40.0);
        assert_eq!(b.height(), 20.0);
    }

    #[test]
    fn boxes_deserialize_from_wire_shape() {
        let boxes: Vec<BoundingBox> =
            serde_json::from_str(r#"[{"x1":10,"y1":10,"x2":50,"y2":50}]"#).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x2, 50.0);
    }
}
