// Promptdock Screen Source
// Read-only screen capture behind a trait so the locator can run against fakes

use image::RgbaImage;

use crate::geometry::Rect;

/// Errors raised while capturing screen content.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no monitor available for capture")]
    NoMonitor,

    #[error("capture region {0:?} lies outside the screen")]
    OutOfBounds(Rect),

    #[error("screen capture failed: {0}")]
    Backend(String),
}

/// Provider of current screen pixels.
///
/// The locator treats captures as a best-effort external sensor
/// reading; implementations must not cache frames across calls.
pub trait ScreenSource {
    /// Capture the full primary screen.
    fn capture_screen(&mut self) -> Result<RgbaImage, CaptureError>;

    /// Capture one screen rectangle. The default implementation crops
    /// a full capture; native backends may do better.
    fn capture_region(&mut self, region: Rect) -> Result<RgbaImage, CaptureError> {
        let full = self.capture_screen()?;
        crop(&full, region).ok_or(CaptureError::OutOfBounds(region))
    }
}

fn crop(image: &RgbaImage, region: Rect) -> Option<RgbaImage> {
    if region.x < 0
        || region.y < 0
        || region.width == 0
        || region.height == 0
        || region.x as u32 + region.width > image.width()
        || region.y as u32 + region.height > image.height()
    {
        return None;
    }
    Some(
        image::imageops::crop_imm(
            image,
            region.x as u32,
            region.y as u32,
            region.width,
            region.height,
        )
        .to_image(),
    )
}

/// In-memory screen source used by tests and by the calibration
/// overlay preview. Serves a fixed frame.
#[derive(Debug, Clone)]
pub struct BufferScreenSource {
    frame: RgbaImage,
}

impl BufferScreenSource {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }

    pub fn set_frame(&mut self, frame: RgbaImage) {
        self.frame = frame;
    }
}

impl ScreenSource for BufferScreenSource {
    fn capture_screen(&mut self) -> Result<RgbaImage, CaptureError> {
        Ok(self.frame.clone())
    }
}

/// Capture via the xcap monitor API.
#[cfg(feature = "native-backends")]
pub struct XcapScreenSource;

#[cfg(feature = "native-backends")]
impl ScreenSource for XcapScreenSource {
    fn capture_screen(&mut self) -> Result<RgbaImage, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or(CaptureError::NoMonitor)?;
        monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))
    }
}
