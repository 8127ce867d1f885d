// Promptdock CLI
// Standalone binary driving the calibration and injection engine

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use promptdock_core::{
    BackendFactory, CalibrationEvent, CalibrationPhase, CalibrationProgress, Chord, EnigoSynth,
    Engine, EngineError, HookConfig, HotkeyInterceptor, Payload, Point, Rect, SendOptions,
    Settings, Target, WindowBackend, X11WindowBackend, XcapScreenSource,
};

#[derive(Parser, Debug)]
#[command(name = "promptdock")]
#[command(version = "0.2.0")]
#[command(about = "Send prompts into host application windows", long_about = None)]
struct Args {
    /// TOML settings file (defaults to the user config directory)
    #[arg(short, long, value_name = "SETTINGS")]
    settings: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deliver a payload to a calibrated target
    Send {
        /// Target as container/sub-target, e.g. vscode/copilot
        target: String,

        /// Text to paste
        #[arg(long, conflicts_with = "chord")]
        text: Option<String>,

        /// Key chord to send instead of text, e.g. ctrl+enter
        #[arg(long)]
        chord: Option<String>,

        /// Do not press Enter after delivery
        #[arg(long)]
        no_submit: bool,
    },
    /// Calibrate a target's anchor and click point
    Calibrate {
        /// Target as container/sub-target
        target: String,
    },
    /// Run the global hotkey interceptor
    Daemon,
    /// List top-level windows as the resolver sees them
    Windows,
}

/// Backends for real displays, constructed fresh per operation.
struct NativeFactory;

impl BackendFactory for NativeFactory {
    type Windows = X11WindowBackend;
    type Screen = XcapScreenSource;
    type Synth = EnigoSynth;

    fn window_backend(&self) -> Result<X11WindowBackend, EngineError> {
        X11WindowBackend::connect().map_err(|e| EngineError::Backend(e.to_string()))
    }

    fn screen_source(&self) -> Result<XcapScreenSource, EngineError> {
        Ok(XcapScreenSource)
    }

    fn input_synth(&self) -> Result<EnigoSynth, EngineError> {
        EnigoSynth::new().map_err(|e| EngineError::Backend(e.to_string()))
    }
}

fn parse_target(spec: &str) -> Result<Target> {
    let (container, sub_target) = spec
        .split_once('/')
        .ok_or_else(|| anyhow!("target must be container/sub-target, got '{}'", spec))?;
    if container.is_empty() || sub_target.is_empty() {
        bail!("target must be container/sub-target, got '{}'", spec);
    }
    Ok(Target::new(container, sub_target))
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let settings = match &args.settings {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load_default().context("loading default settings")?,
    };

    match args.command {
        Command::Send {
            target,
            text,
            chord,
            no_submit,
        } => cmd_send(settings, &target, text, chord, no_submit),
        Command::Calibrate { target } => cmd_calibrate(settings, &target),
        Command::Daemon => cmd_daemon(settings),
        Command::Windows => cmd_windows(),
    }
}

fn cmd_send(
    settings: Settings,
    target: &str,
    text: Option<String>,
    chord: Option<String>,
    no_submit: bool,
) -> Result<()> {
    let target = parse_target(target)?;
    let payload = match (text, chord) {
        (Some(text), None) => Payload::Text(text),
        (None, Some(chord)) => {
            Payload::Chord(Chord::parse(&chord).with_context(|| format!("chord '{}'", chord))?)
        }
        _ => bail!("exactly one of --text or --chord is required"),
    };

    let (engine, notifications) = Engine::new(NativeFactory, settings)?;
    let _worker = engine.send(
        target,
        payload,
        SendOptions {
            auto_submit: !no_submit,
        },
    );

    let notification = notifications
        .recv()
        .context("engine worker disappeared without reporting")?;
    match notification.result {
        Ok(()) => {
            println!("sent to {}", notification.target);
            Ok(())
        }
        Err(e) => {
            let hint = e
                .remediation_hint()
                .map(|h| format!(" ({})", h))
                .unwrap_or_default();
            bail!("send to {} failed: {}{}", notification.target, e, hint)
        }
    }
}

/// Text-mode calibration: coordinates are typed rather than drawn,
/// since the overlay UI lives outside this binary.
fn cmd_calibrate(settings: Settings, target: &str) -> Result<()> {
    let target = parse_target(target)?;
    let (engine, _notifications) = Engine::new(NativeFactory, settings)?;

    let outcome = engine.calibrate_with(target, |session| -> Result<()> {
        session.begin();
        println!("Calibrating. Enter 'cancel' at any prompt to abort.");

        loop {
            match session.phase() {
                CalibrationPhase::CapturingAnchor => {
                    let line = prompt("anchor region as 'x y width height': ")?;
                    let event = if line == "cancel" {
                        CalibrationEvent::Cancel
                    } else {
                        let [x, y, w, h] = parse_numbers::<4>(&line)?;
                        CalibrationEvent::RegionSelected(Rect::new(x, y, w as u32, h as u32))
                    };
                    report(session.handle(event)?);
                }
                CalibrationPhase::CapturingClickPoint => {
                    let line = prompt("click point as 'x y': ")?;
                    let event = if line == "cancel" {
                        CalibrationEvent::Cancel
                    } else {
                        let [x, y] = parse_numbers::<2>(&line)?;
                        CalibrationEvent::PointClicked(Point::new(x, y))
                    };
                    report(session.handle(event)?);
                }
                CalibrationPhase::Complete | CalibrationPhase::Cancelled => return Ok(()),
                CalibrationPhase::Idle => unreachable!("session was started"),
            }
        }
    })?;
    outcome
}

fn report(progress: CalibrationProgress) {
    match progress {
        CalibrationProgress::AnchorCaptured => println!("anchor captured"),
        CalibrationProgress::RegionRejected => println!("region too small, try again"),
        CalibrationProgress::ClickPointMissed => {
            println!("anchor not re-locatable on screen, click again or cancel")
        }
        CalibrationProgress::Completed(record) => println!(
            "calibrated: offset ({}, {})",
            record.offset_x, record.offset_y
        ),
        CalibrationProgress::Cancelled => println!("cancelled, prior calibration untouched"),
        CalibrationProgress::Ignored => {}
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_numbers<const N: usize>(line: &str) -> Result<[i32; N]> {
    let values: Vec<i32> = line
        .split_whitespace()
        .map(|t| t.parse::<i32>().map_err(|_| anyhow!("not a number: '{}'", t)))
        .collect::<Result<_>>()?;
    values
        .try_into()
        .map_err(|_| anyhow!("expected {} numbers", N))
}

fn cmd_daemon(settings: Settings) -> Result<()> {
    let hook_config = HookConfig::from_settings(&settings.hotkey)?;
    let (engine, notifications) = Engine::new(NativeFactory, settings)?;
    let (redirect_tx, redirect_rx) = channel();

    let _interceptor =
        HotkeyInterceptor::install(hook_config, engine.redirect_flag(), redirect_tx);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    log::info!("daemon running, press Ctrl+C to stop");
    while !shutdown.load(Ordering::Relaxed) {
        match redirect_rx.try_recv() {
            Ok(_) => {
                if let Err(e) = engine.handle_redirect() {
                    log::error!("redirect action failed: {}", e);
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
        while let Ok(notification) = notifications.try_recv() {
            match notification.result {
                Ok(()) => log::info!("send to {} completed", notification.target),
                Err(e) => log::error!("send to {} failed: {}", notification.target, e),
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    log::info!("shutting down");
    Ok(())
}

fn cmd_windows() -> Result<()> {
    let mut backend = X11WindowBackend::connect()?;
    let windows = backend.list_windows()?;
    println!("Found {} window(s):", windows.len());
    for w in &windows {
        println!(
            "  {:#010x} class={:<24} pid={:<7} {}x{}{}{} {}",
            w.id,
            w.class,
            w.pid,
            w.rect.width,
            w.rect.height,
            if w.visible { "" } else { " hidden" },
            if w.minimized { " minimized" } else { "" },
            w.title
        );
    }
    Ok(())
}
