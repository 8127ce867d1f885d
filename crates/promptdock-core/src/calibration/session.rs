// Promptdock Calibration Session
// Two-phase interactive state machine producing an (anchor image, offset) pair

use std::path::PathBuf;

use crate::anchor::screen::ScreenSource;
use crate::anchor::{AnchorLocator, LocateError};
use crate::calibration::store::{CalibrationRecord, CalibrationStore, StoreError};
use crate::geometry::{Point, Rect};
use crate::settings::Settings;
use crate::target::{ContainerSpec, Target};

/// Session states. The overlay UI renders according to the current
/// phase and feeds events back; each transition is testable without a
/// live display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    CapturingAnchor,
    CapturingClickPoint,
    Complete,
    Cancelled,
}

/// Overlay input driving the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationEvent {
    /// The user released a drag rectangle on the anchor overlay.
    RegionSelected(Rect),
    /// The user clicked the target point on the second overlay.
    PointClicked(Point),
    /// Escape key or secondary mouse button, valid in every phase.
    Cancel,
}

/// What a handled event did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationProgress {
    /// Anchor image captured and saved; now capturing the click point.
    AnchorCaptured,
    /// Drag rectangle was degenerate; still capturing the anchor.
    RegionRejected,
    /// The saved anchor could not be re-located on screen; still
    /// capturing the click point so the user may retry or cancel.
    ClickPointMissed,
    /// Calibration persisted.
    Completed(CalibrationRecord),
    /// Session torn down, prior record untouched.
    Cancelled,
    /// Event was not meaningful in the current phase.
    Ignored,
}

/// Failures outside the user-driven flow (capture or persistence).
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("failed to save anchor image: {0}")]
    SaveAnchor(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Interactive two-phase calibration for one target.
///
/// `Idle -> CapturingAnchor -> CapturingClickPoint -> Complete`
/// with `Cancel` reachable from every non-terminal phase. The click
/// point phase re-runs the locator against the just-saved anchor image
/// rather than trusting the drag rectangle's raw coordinates, because
/// the anchor may have been captured slightly off-center from where it
/// will later be matched.
pub struct CalibrationSession<'a, S: ScreenSource> {
    target: Target,
    title_pattern: String,
    anchor_path: PathBuf,
    /// Where the captured image lives until the session completes. A
    /// prior calibration may point at `anchor_path`; writing there
    /// before completion would let a cancel destroy it.
    staging_path: PathBuf,
    min_anchor_size: u32,
    phase: CalibrationPhase,
    locator: &'a mut AnchorLocator<S>,
    store: &'a mut CalibrationStore,
    /// Whether this session wrote a staged image that a cancel must
    /// clean up.
    saved_anchor: bool,
}

impl<'a, S: ScreenSource> CalibrationSession<'a, S> {
    pub fn new(
        target: Target,
        container: &ContainerSpec,
        settings: &Settings,
        locator: &'a mut AnchorLocator<S>,
        store: &'a mut CalibrationStore,
    ) -> Self {
        let anchor_path = settings
            .anchors_dir
            .join(format!("{}_{}.png", target.container, target.sub_target));
        let staging_path = settings
            .anchors_dir
            .join(format!("{}_{}.pending.png", target.container, target.sub_target));
        let title_pattern = store
            .get(&target)
            .map(|r| r.window_title_pattern.clone())
            .unwrap_or_else(|| container.title_pattern.clone());
        Self {
            target,
            title_pattern,
            anchor_path,
            staging_path,
            min_anchor_size: settings.min_anchor_size_px,
            phase: CalibrationPhase::Idle,
            locator,
            store,
            saved_anchor: false,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Leave `Idle` and show the anchor overlay.
    pub fn begin(&mut self) {
        if self.phase == CalibrationPhase::Idle {
            self.phase = CalibrationPhase::CapturingAnchor;
        }
    }

    pub fn handle(
        &mut self,
        event: CalibrationEvent,
    ) -> Result<CalibrationProgress, CalibrationError> {
        match (self.phase, event) {
            (CalibrationPhase::CapturingAnchor, CalibrationEvent::RegionSelected(rect)) => {
                self.capture_anchor(rect)
            }
            (CalibrationPhase::CapturingClickPoint, CalibrationEvent::PointClicked(point)) => {
                self.complete(point)
            }
            (
                CalibrationPhase::CapturingAnchor | CalibrationPhase::CapturingClickPoint,
                CalibrationEvent::Cancel,
            ) => Ok(self.cancel()),
            _ => Ok(CalibrationProgress::Ignored),
        }
    }

    fn capture_anchor(&mut self, rect: Rect) -> Result<CalibrationProgress, CalibrationError> {
        if rect.width < self.min_anchor_size || rect.height < self.min_anchor_size {
            log::debug!(
                "rejecting degenerate anchor rectangle {}x{}",
                rect.width,
                rect.height
            );
            return Ok(CalibrationProgress::RegionRejected);
        }

        let capture = self.locator.screen_mut().capture_region(rect);
        let image = capture.map_err(LocateError::from)?;
        if let Some(parent) = self.staging_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CalibrationError::SaveAnchor(e.to_string()))?;
        }
        image
            .save(&self.staging_path)
            .map_err(|e| CalibrationError::SaveAnchor(e.to_string()))?;
        self.saved_anchor = true;
        self.phase = CalibrationPhase::CapturingClickPoint;
        log::info!(
            "anchor for {} staged at {}",
            self.target,
            self.staging_path.display()
        );
        Ok(CalibrationProgress::AnchorCaptured)
    }

    fn complete(&mut self, click: Point) -> Result<CalibrationProgress, CalibrationError> {
        // The overlay has been withdrawn by the time this runs, so the
        // capture sees the real screen underneath.
        let Some(found) = self.locator.locate_path(&self.staging_path)? else {
            log::warn!("anchor for {} not re-locatable after capture", self.target);
            return Ok(CalibrationProgress::ClickPointMissed);
        };

        // The staged image replaces any prior anchor only now that the
        // calibration is committing.
        std::fs::rename(&self.staging_path, &self.anchor_path)
            .map_err(|e| CalibrationError::SaveAnchor(e.to_string()))?;
        self.saved_anchor = false;

        let center = found.center();
        let record = CalibrationRecord::calibrated(
            self.anchor_path.clone(),
            click.x - center.x,
            click.y - center.y,
            self.title_pattern.clone(),
        );
        self.store.upsert(&self.target, record.clone())?;
        self.phase = CalibrationPhase::Complete;
        log::info!(
            "calibrated {}: offset ({}, {})",
            self.target,
            record.offset_x,
            record.offset_y
        );
        Ok(CalibrationProgress::Completed(record))
    }

    fn cancel(&mut self) -> CalibrationProgress {
        if self.saved_anchor {
            // Only the staged image belongs to this session; a prior
            // calibration's image at `anchor_path` is untouched.
            let _ = std::fs::remove_file(&self.staging_path);
        }
        self.phase = CalibrationPhase::Cancelled;
        log::info!("calibration for {} cancelled", self.target);
        CalibrationProgress::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::BufferScreenSource;
    use crate::target::default_containers;
    use image::{Rgba, RgbaImage};

    fn frame_with_stamp(at_x: u32, at_y: u32) -> RgbaImage {
        let mut frame = RgbaImage::from_fn(400, 300, |x, y| {
            let v = ((x * 7 + y * 11) % 233) as u8;
            Rgba([v, v, v, 255])
        });
        for y in 0..16 {
            for x in 0..24 {
                let v = if (x / 3 + y / 3) % 2 == 0 { 255 } else { 0 };
                frame.put_pixel(at_x + x, at_y + y, Rgba([v, v, v, 255]));
            }
        }
        frame
    }

    struct Fixture {
        settings: Settings,
        store: CalibrationStore,
        locator: AnchorLocator<BufferScreenSource>,
        container: ContainerSpec,
        _dir: tempfile::TempDir,
    }

    fn fixture(frame: RgbaImage) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.anchors_dir = dir.path().join("anchors");
        settings.store_path = dir.path().join("targets.json");
        let store = CalibrationStore::load(&settings.store_path).unwrap();
        let locator = AnchorLocator::new(
            BufferScreenSource::new(frame),
            settings.confidence_threshold,
        );
        let container = default_containers()
            .into_iter()
            .find(|c| c.id == "vscode")
            .unwrap();
        Fixture {
            settings,
            store,
            locator,
            container,
            _dir: dir,
        }
    }

    fn target() -> Target {
        Target::new("vscode", "copilot")
    }

    #[test]
    fn test_full_flow_offset_is_click_minus_anchor_center() {
        // Stamp occupies (100,80)..(124,96); its center is (112, 88).
        let mut fx = fixture(frame_with_stamp(100, 80));
        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );
        assert_eq!(session.phase(), CalibrationPhase::Idle);
        session.begin();
        assert_eq!(session.phase(), CalibrationPhase::CapturingAnchor);

        let progress = session
            .handle(CalibrationEvent::RegionSelected(Rect::new(100, 80, 24, 16)))
            .unwrap();
        assert_eq!(progress, CalibrationProgress::AnchorCaptured);
        assert_eq!(session.phase(), CalibrationPhase::CapturingClickPoint);

        let progress = session
            .handle(CalibrationEvent::PointClicked(Point::new(112, 43)))
            .unwrap();
        let CalibrationProgress::Completed(record) = progress else {
            panic!("expected completion, got {:?}", progress);
        };
        assert_eq!(session.phase(), CalibrationPhase::Complete);
        assert_eq!((record.offset_x, record.offset_y), (0, -45));
        assert!(record.is_calibrated());

        // Persisted immediately.
        drop(session);
        assert_eq!(fx.store.get(&target()).unwrap().offset_y, -45);
    }

    #[test]
    fn test_degenerate_rectangle_stays_in_capture_phase() {
        let mut fx = fixture(frame_with_stamp(100, 80));
        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );
        session.begin();

        let progress = session
            .handle(CalibrationEvent::RegionSelected(Rect::new(10, 10, 3, 40)))
            .unwrap();
        assert_eq!(progress, CalibrationProgress::RegionRejected);
        assert_eq!(session.phase(), CalibrationPhase::CapturingAnchor);
    }

    /// A prior calibration for the same target points at the exact
    /// path a new session will eventually write to.
    fn prior_record(fx: &Fixture) -> CalibrationRecord {
        let path = fx.settings.anchors_dir.join("vscode_copilot.png");
        std::fs::create_dir_all(&fx.settings.anchors_dir).unwrap();
        RgbaImage::from_pixel(24, 16, Rgba([9, 9, 9, 255]))
            .save(&path)
            .unwrap();
        CalibrationRecord::calibrated(path, 7, -9, "Visual Studio Code".to_string())
    }

    #[test]
    fn test_cancel_discards_partial_state_and_prior_record_survives() {
        let mut fx = fixture(frame_with_stamp(100, 80));
        let prior = prior_record(&fx);
        fx.store.upsert(&target(), prior.clone()).unwrap();

        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );
        session.begin();
        session
            .handle(CalibrationEvent::RegionSelected(Rect::new(100, 80, 24, 16)))
            .unwrap();

        let progress = session.handle(CalibrationEvent::Cancel).unwrap();
        assert_eq!(progress, CalibrationProgress::Cancelled);
        assert_eq!(session.phase(), CalibrationPhase::Cancelled);
        drop(session);
        // The prior record and the image it points at both survive, so
        // sends keep working after an aborted re-calibration.
        assert_eq!(fx.store.get(&target()).unwrap(), &prior);
        assert!(prior.anchor_image_path.exists());
        assert!(!fx
            .settings
            .anchors_dir
            .join("vscode_copilot.pending.png")
            .exists());
    }

    #[test]
    fn test_completed_recalibration_replaces_prior_image() {
        let mut fx = fixture(frame_with_stamp(100, 80));
        let prior = prior_record(&fx);
        fx.store.upsert(&target(), prior.clone()).unwrap();

        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );
        session.begin();
        session
            .handle(CalibrationEvent::RegionSelected(Rect::new(100, 80, 24, 16)))
            .unwrap();
        let progress = session
            .handle(CalibrationEvent::PointClicked(Point::new(112, 43)))
            .unwrap();
        let CalibrationProgress::Completed(record) = progress else {
            panic!("expected completion, got {:?}", progress);
        };
        drop(session);

        assert_eq!(record.anchor_image_path, prior.anchor_image_path);
        assert!(record.anchor_image_path.exists());
        assert!(!fx
            .settings
            .anchors_dir
            .join("vscode_copilot.pending.png")
            .exists());
        assert_eq!(
            (
                fx.store.get(&target()).unwrap().offset_x,
                fx.store.get(&target()).unwrap().offset_y
            ),
            (0, -45)
        );
    }

    #[test]
    fn test_click_point_miss_allows_retry() {
        // Frame turns blank between capture and click, so the anchor
        // cannot be re-located.
        let mut fx = fixture(frame_with_stamp(100, 80));
        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );
        session.begin();
        session
            .handle(CalibrationEvent::RegionSelected(Rect::new(100, 80, 24, 16)))
            .unwrap();

        session
            .locator
            .screen_mut()
            .set_frame(RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255])));

        let progress = session
            .handle(CalibrationEvent::PointClicked(Point::new(50, 50)))
            .unwrap();
        assert_eq!(progress, CalibrationProgress::ClickPointMissed);
        assert_eq!(session.phase(), CalibrationPhase::CapturingClickPoint);
        drop(session);
        assert!(fx.store.get(&target()).is_none());
    }

    #[test]
    fn test_events_ignored_outside_their_phase() {
        let mut fx = fixture(frame_with_stamp(100, 80));
        let mut session = CalibrationSession::new(
            target(),
            &fx.container,
            &fx.settings,
            &mut fx.locator,
            &mut fx.store,
        );

        // Idle consumes nothing.
        let progress = session
            .handle(CalibrationEvent::PointClicked(Point::new(1, 1)))
            .unwrap();
        assert_eq!(progress, CalibrationProgress::Ignored);

        session.begin();
        let progress = session
            .handle(CalibrationEvent::PointClicked(Point::new(1, 1)))
            .unwrap();
        assert_eq!(progress, CalibrationProgress::Ignored);
        assert_eq!(session.phase(), CalibrationPhase::CapturingAnchor);
    }
}
