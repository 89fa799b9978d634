//! Gemini Live session channel over a websocket.
//!
//! ```text
//!  connect ──► send setup ──► wait setupComplete ──► ChannelLink
//!
//!  ChannelSender ──mpsc──► writer task ──► ws sink      (realtimeInput, in order)
//!  ws stream ──► reader task ──mpsc──► ChannelEvent     (serverContent, goAway, close)
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::audio::EncodedChunk;
use crate::error::SessionError;
use crate::session::LiveConfig;

use super::protocol::{ClientMessage, RealtimeInput, ServerFrame, Setup};
use super::{ChannelEvent, ChannelLink, ChannelSender, SessionChannel};

pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const SETUP_TIMEOUT: Duration = Duration::from_secs(15);

enum Outbound {
    Audio(EncodedChunk),
    Close,
}

/// Opens live sessions against the Gemini Live API.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiLiveChannel;

/// Websocket URL for `endpoint` (or [`LIVE_ENDPOINT`]) carrying the API key.
fn endpoint_url(endpoint: Option<&str>, api_key: &str) -> Result<Url> {
    let base = endpoint.unwrap_or(LIVE_ENDPOINT);
    let mut url = Url::parse(base).with_context(|| format!("Invalid endpoint {base}"))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

impl GeminiLiveChannel {
    async fn connect(&self, config: &LiveConfig) -> Result<ChannelLink> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("No API key configured")?;
        let url = endpoint_url(config.endpoint.as_deref(), api_key)?;

        info!("Connecting to live model {}...", config.model);
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .context("Websocket connection failed")?;
        let (mut write, mut read) = ws_stream.split();

        let setup = serde_json::to_string(&ClientMessage::Setup(Setup::from_config(config)))
            .context("Failed to encode setup message")?;
        write
            .send(WsMessage::Text(setup))
            .await
            .context("Failed to send setup message")?;

        tokio::time::timeout(SETUP_TIMEOUT, wait_for_setup(&mut read))
            .await
            .context("Timed out waiting for setupComplete")??;
        info!("Live session ready");

        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Audio(chunk) => {
                        let message = ClientMessage::RealtimeInput(RealtimeInput { audio: chunk });
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to encode realtime input: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = write.send(WsMessage::Text(text)).await {
                            let _ = writer_events.send(ChannelEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    Outbound::Close => {
                        debug!("Closing live websocket");
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                let event = match msg_result {
                    Ok(WsMessage::Text(text)) => parse_event(text.as_bytes()),
                    Ok(WsMessage::Binary(bytes)) => parse_event(&bytes),
                    Ok(WsMessage::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        let _ = event_tx.send(ChannelEvent::Closed(reason));
                        return;
                    }
                    Ok(_) => None,
                    Err(e) => {
                        let _ = event_tx.send(ChannelEvent::Error(e.to_string()));
                        return;
                    }
                };
                if let Some(event) = event {
                    let closing = matches!(event, ChannelEvent::Closed(_));
                    if event_tx.send(event).is_err() || closing {
                        return;
                    }
                }
            }
            let _ = event_tx.send(ChannelEvent::Closed(None));
        });

        Ok(ChannelLink {
            sender: Box::new(GeminiSender {
                outbound: out_tx,
                reader,
            }),
            events: event_rx,
        })
    }
}

#[async_trait]
impl SessionChannel for GeminiLiveChannel {
    async fn open(&self, config: &LiveConfig) -> Result<ChannelLink, SessionError> {
        self.connect(config)
            .await
            .map_err(|e| SessionError::ChannelOpenFailure(format!("{e:#}")))
    }
}

async fn wait_for_setup<S>(read: &mut S) -> Result<()>
where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = read.next().await {
        let payload = match msg_result.context("Websocket error during setup")? {
            WsMessage::Text(text) => text.into_bytes(),
            WsMessage::Binary(bytes) => bytes,
            WsMessage::Close(frame) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                anyhow::bail!("Server closed the connection during setup: {reason}");
            }
            _ => continue,
        };
        let frame: ServerFrame =
            serde_json::from_slice(&payload).context("Invalid setup response")?;
        if frame.setup_complete.is_some() {
            return Ok(());
        }
        debug!("Ignoring message received before setupComplete");
    }
    anyhow::bail!("Connection ended before setupComplete")
}

fn parse_event(payload: &[u8]) -> Option<ChannelEvent> {
    let frame: ServerFrame = match serde_json::from_slice(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Invalid message from live server: {}", e);
            return None;
        }
    };
    if let Some(go_away) = frame.go_away {
        info!("Server requested disconnect (time left: {:?})", go_away.time_left);
        return Some(ChannelEvent::Closed(Some("server requested disconnect".to_string())));
    }
    frame
        .server_content
        .map(|content| ChannelEvent::Message(content.into_message()))
}

struct GeminiSender {
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
}

impl ChannelSender for GeminiSender {
    fn send_realtime_input(&self, chunk: EncodedChunk) -> Result<(), SessionError> {
        self.outbound
            .send(Outbound::Audio(chunk))
            .map_err(|_| SessionError::ChannelClosed("websocket writer stopped".to_string()))
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for GeminiSender {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
