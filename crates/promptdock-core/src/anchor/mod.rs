//! Anchor location
//!
//! Finds a previously captured template image within current screen
//! content and reports its bounding box. A miss is a normal outcome,
//! returned as `Ok(None)` so callers handle it as data.

pub mod matcher;
pub mod screen;

use std::path::Path;

use image::RgbaImage;

use crate::geometry::{Point, Rect};
use matcher::{find_template, to_gray};

pub use matcher::TemplateMatch;
pub use screen::{BufferScreenSource, CaptureError, ScreenSource};
#[cfg(feature = "native-backends")]
pub use screen::XcapScreenSource;

/// A successful anchor re-location on the live screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorMatch {
    /// On-screen bounding box of the anchor.
    pub bbox: Rect,
    /// Normalized correlation score in [-1.0, 1.0].
    pub score: f32,
}

impl AnchorMatch {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Errors raised while preparing a locate operation. A failed match is
/// not among them.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("failed to read anchor image: {0}")]
    AnchorImage(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Locates anchor templates on the live screen.
///
/// Read-only: capturing pixels is its only interaction with the
/// outside world.
pub struct AnchorLocator<S: ScreenSource> {
    screen: S,
    threshold: f32,
}

impl<S: ScreenSource> AnchorLocator<S> {
    pub fn new(screen: S, threshold: f32) -> Self {
        Self { screen, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn screen_mut(&mut self) -> &mut S {
        &mut self.screen
    }

    /// Locate a template image on the current screen.
    pub fn locate(&mut self, template: &RgbaImage) -> Result<Option<AnchorMatch>, LocateError> {
        let frame = self.screen.capture_screen()?;
        let found = find_template(&to_gray(&frame), &to_gray(template), self.threshold);
        if found.is_none() {
            log::debug!(
                "anchor miss: {}x{} template below threshold {}",
                template.width(),
                template.height(),
                self.threshold
            );
        }
        Ok(found.map(|m| AnchorMatch {
            bbox: m.bbox,
            score: m.score,
        }))
    }

    /// Locate an anchor image stored on disk.
    pub fn locate_path(&mut self, path: &Path) -> Result<Option<AnchorMatch>, LocateError> {
        let template = image::open(path)
            .map_err(|e| LocateError::AnchorImage(format!("{}: {}", path.display(), e)))?
            .to_rgba8();
        self.locate(&template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn textured_frame(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 13 + y * 29) % 241) as u8;
            Rgba([v, v.wrapping_add(40), v.wrapping_add(80), 255])
        })
    }

    fn checker_template() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                Rgba([250, 250, 250, 255])
            } else {
                Rgba([5, 5, 5, 255])
            }
        })
    }

    fn embed(frame: &mut RgbaImage, template: &RgbaImage, at_x: u32, at_y: u32) {
        for (x, y, p) in template.enumerate_pixels() {
            frame.put_pixel(at_x + x, at_y + y, *p);
        }
    }

    #[test]
    fn test_locate_hit_reports_screen_coordinates() {
        let mut frame = textured_frame(300, 200);
        let template = checker_template();
        embed(&mut frame, &template, 140, 90);

        let mut locator = AnchorLocator::new(BufferScreenSource::new(frame), 0.7);
        let hit = locator.locate(&template).unwrap().expect("embedded anchor");
        assert_eq!(hit.bbox, Rect::new(140, 90, 10, 10));
        assert_eq!(hit.center(), Point::new(145, 95));
        assert!(hit.score >= 0.7);
    }

    #[test]
    fn test_locate_miss_is_ok_none() {
        let frame = textured_frame(300, 200);
        let mut locator = AnchorLocator::new(BufferScreenSource::new(frame), 0.7);
        let result = locator.locate(&checker_template()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_locate_path_missing_file() {
        let frame = textured_frame(30, 20);
        let mut locator = AnchorLocator::new(BufferScreenSource::new(frame), 0.7);
        let err = locator
            .locate_path(Path::new("/nonexistent/anchor.png"))
            .unwrap_err();
        assert!(matches!(err, LocateError::AnchorImage(_)));
    }
}
