mod audio;
mod bridge;
mod config;
mod logging;
mod render;
mod state;

use std::{
    io::{IsTerminal, Write},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use audio::AlarmOutput;
use blinkrise_core::{DashboardChannels, FrameSink, SessionController, ToggleOutcome};
use blinkrise_http::{HttpDashboardBackend, HttpFrameSink};
use bridge::{DashboardBridge, RenderCallback, spawn_alarm_worker};
use config::DashboardConfig;
use state::DashboardView;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

type Controller = SessionController<HttpDashboardBackend>;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    logging::init();
    info!("starting blinkrise-dashboard");

    let config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            eprintln!("blinkrise-dashboard: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("blinkrise-runtime")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config));
    // The stdin reader sits on a blocking thread that never returns on its own.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "dashboard exited with error");
            eprintln!("blinkrise-dashboard: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        api_base_url = %config.api_base_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        autostart = config.autostart,
        "dashboard configured"
    );

    let backend = HttpDashboardBackend::new(config.http_backend_config())?;
    let frame_sink = Arc::new(HttpFrameSink::new(config.request_timeout)?);
    let channels = DashboardChannels::default();

    let alarm_sound = config.alarm_sound.clone();
    // Detached: it ends once the controller drops its senders.
    let _alarm_worker = spawn_alarm_worker(&channels, move || AlarmOutput::open(&alarm_sound))?;

    let color = std::io::stdout().is_terminal();
    let render_view: RenderCallback = Arc::new(move |view: &DashboardView| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "\n{}", render::render(view, color));
        let _ = stdout.flush();
    });
    let bridge = DashboardBridge::spawn(
        &channels,
        &tokio::runtime::Handle::current(),
        render_view,
    );

    let controller = Arc::new(SessionController::new(
        backend,
        Arc::clone(&frame_sink) as Arc<dyn FrameSink>,
        config.controller_config(),
        channels,
    ));

    if config.autostart {
        spawn_toggle(&controller);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for ctrl-c");
                }
                info!("interrupt received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_command(&controller, line.trim()) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read command");
                    break;
                }
            },
        }
    }

    controller.shutdown().await;
    info!(
        final_view = ?bridge.view(),
        feed_bytes = frame_sink.received_bytes(),
        "dashboard stopped"
    );
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_command(controller: &Arc<Controller>, command: &str) -> bool {
    match command {
        "" => {}
        "t" | "toggle" => spawn_toggle(controller),
        "s" | "status" => info!(view = ?controller.view(), "session status"),
        "q" | "quit" | "exit" => return false,
        other => warn!(command = other, "unknown command; use t, s or q"),
    }
    true
}

// Toggles run off the input loop so quitting can supersede a pending start.
fn spawn_toggle(controller: &Arc<Controller>) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move { report_toggle(controller.toggle().await) });
}

fn report_toggle(outcome: ToggleOutcome) {
    match outcome {
        ToggleOutcome::Started { epoch } => info!(%epoch, "video on"),
        ToggleOutcome::Stopped => info!("video off"),
        ToggleOutcome::StartFailed { message } => warn!(%message, "video did not start"),
        ToggleOutcome::Ignored => info!("toggle ignored: command in flight"),
        ToggleOutcome::Superseded => info!("start superseded by teardown"),
    }
}
