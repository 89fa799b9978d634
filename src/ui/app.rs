//! Main application entry point for the UI.

use crate::session::SessionStatus;
use crate::state::AppState;
use dioxus::prelude::*;
use std::sync::Arc;
use tracing::info;

use super::mentor::{Header, MentorPanel};

#[allow(non_snake_case)]
pub fn App() -> Element {
    let state_arc = use_context::<Arc<AppState>>();

    let mut status = use_signal(SessionStatus::default);

    let state_exit = state_arc.clone();
    use_drop(move || {
        info!("Window closing, shutting down the voice session");
        state_exit.session.shutdown();
    });

    let state_poll = state_arc.clone();
    use_effect(move || {
        let state = state_poll.clone();
        spawn(async move {
            loop {
                let latest = state.status();
                if *status.peek() != latest {
                    status.set(latest);
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        });
    });

    rsx! {
        document::Stylesheet { href: asset!("/assets/custom.css") }
        script { src: "https://cdn.tailwindcss.com" }

        div {
            class: "flex flex-col h-screen w-full bg-slate-900 text-slate-100 font-sans overflow-hidden selection:bg-indigo-500 selection:text-white",

            Header {
                state: status().state,
                model: state_arc.model.clone(),
                voice: state_arc.voice.clone(),
            }

            MentorPanel {
                status: status(),
            }
        }
    }
}
