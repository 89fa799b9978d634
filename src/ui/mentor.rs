//! Voice session panel.

use crate::error::SessionError;
use crate::session::{SessionState, SessionStatus};
use crate::state::AppState;
use dioxus::prelude::*;
use std::sync::Arc;

#[allow(non_snake_case)]
#[component]
pub fn Header(state: SessionState, model: String, voice: String) -> Element {
    let (dot_style, status_text) = match state {
        SessionState::Active => (
            "background: linear-gradient(135deg, #10b981, #34d399); box-shadow: 0 0 10px rgba(16, 185, 129, 0.5);",
            "Connected",
        ),
        SessionState::Connecting | SessionState::Closing => (
            "background: linear-gradient(135deg, #f59e0b, #fbbf24); box-shadow: 0 0 10px rgba(245, 158, 11, 0.5);",
            state.label(),
        ),
        SessionState::Idle | SessionState::Error => (
            "background: linear-gradient(135deg, #ef4444, #f87171); box-shadow: 0 0 10px rgba(239, 68, 68, 0.5);",
            "Disconnected",
        ),
    };

    rsx! {
        div {
            class: "flex items-center justify-between px-8 py-6 glass-strong border-b border-slate-800",

            div {
                div {
                    class: "flex items-center gap-3 mb-1",
                    span { class: "text-3xl", "🎧" }
                    h1 {
                        class: "text-2xl font-bold tracking-tight gradient-text-hero",
                        "Live AI Mentor"
                    }
                }
                p {
                    class: "text-xs text-slate-400 font-medium ml-1 font-mono",
                    "{model} • {voice}"
                }
            }

            div {
                class: "flex items-center gap-2 px-4 py-2 rounded-full bg-slate-800/70",
                div { class: "w-3 h-3 rounded-full", style: dot_style }
                span { class: "text-sm font-semibold", "{status_text}" }
            }
        }
    }
}

#[allow(non_snake_case)]
#[component]
pub fn MentorPanel(status: SessionStatus) -> Element {
    let lines: Vec<String> = status.transcript_lines().map(str::to_string).collect();

    rsx! {
        div {
            class: "flex-1 flex flex-col items-center gap-8 px-8 py-10 overflow-y-auto",

            TalkButton { state: status.state }

            StatusBanner {
                error: status.error.clone(),
                notice: status.notice.clone(),
            }

            LevelMeter {
                level: status.input_level,
                active: status.state == SessionState::Active,
            }

            Transcript { lines: lines }
        }
    }
}

#[allow(non_snake_case)]
#[component]
fn TalkButton(state: SessionState) -> Element {
    let state_arc = use_context::<Arc<AppState>>();

    let on_click = move |_| {
        if state.can_start() {
            state_arc.session.start();
        } else if state.is_live() {
            state_arc.session.stop();
        }
    };

    let (label, hint, tone) = match state {
        SessionState::Idle => (
            "Start talking",
            "Tap to open a voice session",
            "bg-indigo-500/10 border-indigo-500/50 text-indigo-300 hover:bg-indigo-500/20",
        ),
        SessionState::Error => (
            "Try again",
            "The last attempt failed",
            "bg-rose-500/10 border-rose-500/50 text-rose-300 hover:bg-rose-500/20",
        ),
        SessionState::Connecting => (
            "Connecting...",
            "Tap to cancel",
            "bg-amber-500/10 border-amber-500/50 text-amber-300 hover:bg-amber-500/20",
        ),
        SessionState::Active => (
            "End session",
            "Listening, just speak",
            "bg-emerald-500/10 border-emerald-500/50 text-emerald-300 hover:bg-emerald-500/20 listening",
        ),
        SessionState::Closing => (
            "Closing...",
            "Releasing devices",
            "bg-slate-800 border-slate-700 text-slate-400",
        ),
    };

    rsx! {
        button {
            class: format!(
                "w-56 h-56 rounded-full flex flex-col items-center justify-center gap-3 transition-all duration-200 border-2 {}",
                tone
            ),
            disabled: state == SessionState::Closing,
            onclick: on_click,
            div { class: "text-5xl", if state == SessionState::Active { "🎙️" } else { "🔇" } }
            span { class: "text-lg font-bold", "{label}" }
            span { class: "text-xs text-slate-400", "{hint}" }
        }
    }
}

#[allow(non_snake_case)]
#[component]
fn StatusBanner(error: Option<SessionError>, notice: Option<String>) -> Element {
    rsx! {
        if let Some(error) = error {
            div {
                class: "w-full max-w-xl rounded-xl px-4 py-3 text-sm bg-rose-500/10 border border-rose-500/40 text-rose-300",
                div {
                    class: "text-xs font-bold uppercase tracking-wider mb-1",
                    if error.is_start_failure() { "Could not start the session" } else { "Session error" }
                }
                "{error}"
            }
        } else if let Some(notice) = notice {
            div {
                class: "w-full max-w-xl rounded-xl px-4 py-3 text-sm bg-slate-800 border border-slate-700 text-slate-300",
                "{notice}"
            }
        }
    }
}

#[allow(non_snake_case)]
#[component]
fn LevelMeter(level: u32, active: bool) -> Element {
    let level = if active { level.min(100) } else { 0 };

    rsx! {
        div {
            class: "w-full max-w-xl",
            div {
                class: "flex justify-between text-xs mb-2",
                span { class: "text-slate-400", "Mic Level" }
            }
            div {
                class: "h-2 bg-slate-800 rounded-full overflow-hidden relative",
                div {
                    class: "absolute inset-0",
                    style: "background: linear-gradient(to right, #22c55e 0%, #22c55e 50%, #eab308 75%, #ef4444 100%)",
                }
                div {
                    class: "absolute inset-0 bg-slate-800 transition-all duration-75",
                    style: "left: {level}%",
                }
            }
        }
    }
}

#[allow(non_snake_case)]
#[component]
fn Transcript(lines: Vec<String>) -> Element {
    rsx! {
        div {
            class: "w-full max-w-xl flex-1 flex flex-col gap-3",
            div {
                class: "text-xs font-bold text-slate-500 uppercase tracking-wider",
                "Mentor"
            }
            if lines.is_empty() {
                p { class: "text-sm text-slate-500 italic", "Replies will appear here." }
            }
            for (idx, line) in lines.iter().enumerate() {
                p {
                    key: "{idx}",
                    class: "text-sm leading-relaxed text-slate-200 bg-slate-800/60 rounded-xl px-4 py-3",
                    "{line}"
                }
            }
        }
    }
}
