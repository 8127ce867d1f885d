// Promptdock Injection Sequencer
// Window activation, anchor re-location, input synthesis and payload delivery for one send

use crate::anchor::screen::ScreenSource;
use crate::anchor::{AnchorLocator, LocateError};
use crate::calibration::CalibrationRecord;
use crate::error::ErrorKind;
use crate::geometry::Point;
use crate::inject::chord::{Chord, ChordMod};
use crate::inject::synth::{InputSynth, PointerButton, SynthError};
use crate::inject::{ChordKey, Payload, SendOptions};
use crate::settings::Settings;
use crate::target::{ContainerKind, ContainerSpec, Target};
use crate::window::{BackendError, ResolveError, WindowBackend, WindowInfo, WindowResolver};

/// Failure of one send operation.
///
/// All variants are caught and reported at the operation boundary;
/// none terminate the process.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("unknown container '{0}'")]
    UnknownContainer(String),

    #[error("no matching window for container '{0}'")]
    WindowNotFound(String),

    #[error("target {0} has never been calibrated")]
    Uncalibrated(Target),

    #[error("anchor for {0} was not found on screen")]
    AnchorNotFound(Target),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("input synthesis failed at step '{step}': {source}")]
    Synth {
        step: &'static str,
        source: SynthError,
    },
}

impl SendError {
    /// The stable error kind the presentation layer renders from.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SendError::WindowNotFound(_) => ErrorKind::WindowNotFound,
            SendError::Uncalibrated(_) => ErrorKind::Uncalibrated,
            SendError::AnchorNotFound(_) => ErrorKind::AnchorNotFound,
            SendError::UnknownContainer(_)
            | SendError::Resolve(_)
            | SendError::Backend(_)
            | SendError::Locate(_)
            | SendError::Synth { .. } => ErrorKind::Internal,
        }
    }

    pub fn remediation_hint(&self) -> Option<&'static str> {
        self.kind().remediation_hint()
    }
}

fn synth_step(step: &'static str) -> impl FnOnce(SynthError) -> SendError {
    move |source| SendError::Synth { step, source }
}

/// Orchestrates one send operation end to end.
///
/// Every step after window resolution is best-effort: the first
/// failure surfaces immediately and aborts the remaining steps; no
/// automatic retries. Fixed pacing delays between synthesized steps
/// let the target application keep up.
pub struct InjectionSequencer<'a, W: WindowBackend, S: ScreenSource, I: InputSynth> {
    pub windows: &'a mut W,
    pub locator: &'a mut AnchorLocator<S>,
    pub synth: &'a mut I,
    pub resolver: &'a WindowResolver,
    pub settings: &'a Settings,
}

impl<W: WindowBackend, S: ScreenSource, I: InputSynth> InjectionSequencer<'_, W, S, I> {
    /// Deliver `payload` to `target`.
    ///
    /// `record` is the target's calibration record if one exists; the
    /// caller reads it from the store before the operation starts.
    pub fn send(
        &mut self,
        target: &Target,
        record: Option<&CalibrationRecord>,
        payload: &Payload,
        options: &SendOptions,
    ) -> Result<(), SendError> {
        let container = self
            .settings
            .container(&target.container)
            .cloned()
            .ok_or_else(|| SendError::UnknownContainer(target.container.clone()))?;

        let windows = self.windows.list_windows()?;
        let title_override = record.map(|r| r.window_title_pattern.as_str());
        let window = self
            .resolver
            .resolve(&windows, &container, title_override)?
            .ok_or_else(|| SendError::WindowNotFound(container.id.clone()))?;

        // Refuse before producing any synthetic input.
        let anchor_record = match container.kind {
            ContainerKind::CommandLine => None,
            ContainerKind::Anchored => {
                let calibrated = record
                    .filter(|r| r.is_calibrated() && r.anchor_image_path.exists())
                    .ok_or_else(|| SendError::Uncalibrated(target.clone()))?;
                Some(calibrated)
            }
        };

        let original_pointer = self
            .synth
            .pointer_position()
            .map_err(synth_step("pointer-position"))?;

        self.windows.activate(window.id)?;
        std::thread::sleep(self.settings.settle_delay());

        match anchor_record {
            None => self.deliver_command_line(&window, payload, options, original_pointer),
            Some(record) => {
                self.deliver_anchored(target, &container, record, payload, options, original_pointer)
            }
        }
    }

    /// Anchor-free path: context-menu paste at the window center.
    fn deliver_command_line(
        &mut self,
        window: &WindowInfo,
        payload: &Payload,
        options: &SendOptions,
        original_pointer: Point,
    ) -> Result<(), SendError> {
        match payload {
            Payload::Text(text) => {
                self.synth
                    .set_clipboard(text)
                    .map_err(synth_step("clipboard"))?;
                self.pace();
                let result = (|| {
                    self.synth
                        .move_pointer(window.rect.center())
                        .map_err(synth_step("move-to-center"))?;
                    self.pace();
                    self.synth
                        .click(PointerButton::Right)
                        .map_err(synth_step("context-menu"))?;
                    self.maybe_submit(options)
                })();
                let _ = self.synth.move_pointer(original_pointer);
                result
            }
            // The chord path never moves the pointer, so there is
            // nothing to restore.
            Payload::Chord(chord) => {
                self.synth.chord(chord).map_err(synth_step("chord"))?;
                self.maybe_submit(options)
            }
        }
    }

    /// Anchor path: re-locate the landmark (the window may have moved
    /// since calibration), click at `anchor_center + offset`, clear,
    /// deliver.
    fn deliver_anchored(
        &mut self,
        target: &Target,
        container: &ContainerSpec,
        record: &CalibrationRecord,
        payload: &Payload,
        options: &SendOptions,
        original_pointer: Point,
    ) -> Result<(), SendError> {
        let Some(found) = self.locator.locate_path(&record.anchor_image_path)? else {
            log::warn!(
                "anchor miss for {} in container '{}' ({})",
                target,
                container.id,
                record.anchor_image_path.display()
            );
            return Err(SendError::AnchorNotFound(target.clone()));
        };

        let click_point = found.center().offset_by(record.offset_x, record.offset_y);
        log::debug!(
            "anchor for {} at {:?} (score {:.3}), clicking {:?}",
            target,
            found.bbox,
            found.score,
            click_point
        );

        let result = (|| {
            self.synth
                .move_pointer(click_point)
                .map_err(synth_step("move-to-target"))?;
            self.synth
                .click(PointerButton::Left)
                .map_err(synth_step("focus-click"))?;
            self.pace();

            // Clear whatever is already in the input.
            self.synth
                .chord(&select_all())
                .map_err(synth_step("select-all"))?;
            self.pace();
            self.synth
                .tap(ChordKey::Backspace)
                .map_err(synth_step("clear"))?;
            self.pace();

            match payload {
                Payload::Text(text) => {
                    self.synth
                        .set_clipboard(text)
                        .map_err(synth_step("clipboard"))?;
                    self.pace();
                    self.synth
                        .chord(&paste())
                        .map_err(synth_step("paste"))?;
                }
                Payload::Chord(chord) => {
                    self.synth
                        .chord(chord)
                        .map_err(synth_step("chord"))?;
                }
            }
            self.maybe_submit(options)
        })();

        let _ = self.synth.move_pointer(original_pointer);
        result
    }

    fn maybe_submit(&mut self, options: &SendOptions) -> Result<(), SendError> {
        if options.auto_submit {
            self.pace();
            self.synth
                .tap(ChordKey::Enter)
                .map_err(synth_step("submit"))?;
        }
        Ok(())
    }

    fn pace(&self) {
        std::thread::sleep(self.settings.pace_delay());
    }
}

fn select_all() -> Chord {
    Chord {
        modifiers: smallvec::smallvec![ChordMod::Ctrl],
        key: ChordKey::Char('a'),
    }
}

fn paste() -> Chord {
    Chord {
        modifiers: smallvec::smallvec![ChordMod::Ctrl],
        key: ChordKey::Char('v'),
    }
}
