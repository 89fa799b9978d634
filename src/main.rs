mod audio;
mod channel;
mod error;
mod io;
mod playback;
mod session;
mod state;
#[cfg(test)]
mod testing;
mod ui;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use session::MentorConfig;
use state::AppState;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    info!("Starting Live AI Mentor...");

    let config = MentorConfig::from_env();
    info!("Configuration: {:?}", config);
    if let Err(e) = config.validate() {
        // Still launch: the UI reports the error when a session is started.
        error!("{}", e);
    }

    let state = AppState::new(config)?;

    info!("Session thread ready, launching UI...");

    dioxus::LaunchBuilder::desktop()
        .with_context(state)
        .with_cfg(
            dioxus::desktop::Config::new().with_window(
                dioxus::desktop::WindowBuilder::new()
                    .with_title("Live AI Mentor")
                    .with_always_on_top(false),
            ),
        )
        .launch(ui::App);

    Ok(())
}
