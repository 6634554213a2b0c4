//! Common geometry and capture types shared by the engines and the driver

use crate::AutomationError;
use base64::Engine as _;
use image::{ImageBuffer, ImageFormat, Rgba};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Screen rectangle in physical pixels, stored as edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a device-independent point to physical pixels.
    pub fn scaled(&self, ratio: f64) -> Point {
        Point::new(
            (self.x as f64 * ratio).round() as i32,
            (self.y as f64 * ratio).round() as i32,
        )
    }
}

/// How far a tree query reaches from its starting node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeScope {
    /// Immediate children only.
    Children,
    /// Every node below the start, excluding the start itself.
    Descendants,
    /// The start node itself, then its immediate children.
    SelfOrChildren,
    /// The start node and every node below it.
    Subtree,
}

impl TreeScope {
    pub fn includes_self(&self) -> bool {
        matches!(self, TreeScope::SelfOrChildren | TreeScope::Subtree)
    }

    pub fn is_deep(&self) -> bool {
        matches!(self, TreeScope::Descendants | TreeScope::Subtree)
    }
}

/// Holds the screenshot data
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw RGBA pixels, row-major
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ScreenshotResult {
    pub fn to_png(&self) -> Result<Vec<u8>, AutomationError> {
        let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, self.image_data.clone()).ok_or_else(
                || {
                    AutomationError::InvalidArgument(
                        "Invalid screenshot data for buffer creation".to_string(),
                    )
                },
            )?;

        let mut bytes = Cursor::new(Vec::new());
        buffer
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| AutomationError::Internal(format!("Failed to encode PNG: {e}")))?;
        Ok(bytes.into_inner())
    }

    /// PNG bytes as standard base64, the W3C screenshot payload.
    pub fn to_png_base64(&self) -> Result<String, AutomationError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_center_and_contains() {
        let rect = Rect::from_xywh(10, 20, 100, 40);
        assert_eq!(rect.center(), Point::new(60, 40));
        assert!(rect.contains(Point::new(10, 20)));
        assert!(!rect.contains(Point::new(110, 20)));
    }

    #[test]
    fn scaled_point_rounds() {
        assert_eq!(Point::new(100, 51).scaled(1.5), Point::new(150, 77));
    }

    #[test]
    fn screenshot_encodes_png() {
        let shot = ScreenshotResult {
            image_data: vec![255; 2 * 2 * 4],
            width: 2,
            height: 2,
        };
        let png = shot.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert!(!shot.to_png_base64().unwrap().is_empty());
    }

    #[test]
    fn screenshot_rejects_short_buffer() {
        let shot = ScreenshotResult {
            image_data: vec![0; 3],
            width: 2,
            height: 2,
        };
        assert!(matches!(
            shot.to_png(),
            Err(AutomationError::InvalidArgument(_))
        ));
    }
}
