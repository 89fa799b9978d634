//! Dedicated thread running the session controller.
//!
//! cpal streams are not `Send` on every platform, so the controller and the
//! devices it opens live on one thread with a current-thread tokio runtime.
//! The UI talks to it through a command queue and reads a status snapshot.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::channel::GeminiLiveChannel;
use crate::io::CpalDevices;

use super::config::MentorConfig;
use super::controller::{SessionCommand, SessionController};
use super::state::SessionStatus;

pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn spawn(config: MentorConfig) -> Result<Self> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::default());

        let thread = std::thread::Builder::new()
            .name("voice-session".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build session runtime: {}", e);
                        return;
                    }
                };
                let controller = SessionController::new(
                    config,
                    Arc::new(GeminiLiveChannel),
                    Box::new(CpalDevices),
                    status_tx,
                );
                runtime.block_on(controller.run(command_rx));
            })
            .context("Failed to spawn session thread")?;

        info!("Session thread started");
        Ok(Self {
            commands,
            status,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn start(&self) {
        self.send(SessionCommand::Start);
    }

    pub fn stop(&self) {
        self.send(SessionCommand::Stop);
    }

    /// Latest status published by the controller.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Stop any running session and wait for the session thread to exit.
    ///
    /// Only the first call does anything.
    pub fn shutdown(&self) {
        let thread = match self.thread.lock() {
            Ok(mut thread) => thread.take(),
            Err(_) => None,
        };
        if let Some(thread) = thread {
            self.send(SessionCommand::Shutdown);
            if thread.join().is_err() {
                error!("Session thread panicked");
            }
        }
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            error!("Session thread is gone, dropping {:?}", command);
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
