use std::time::Duration;

use anyhow::{Context, anyhow};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, client::IntoClientRequest};
use url::Url;

pub const LIVE_WS_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;

const WS_SEND_TIMEOUT: Duration = Duration::from_secs(3);

fn should_emit_backpressure_warning(dropped: u64) -> bool {
    // First drop, then every 50th.
    dropped > 0 && (dropped == 1 || dropped % 50 == 0)
}

#[derive(Clone, PartialEq, Eq)]
pub struct LiveConfig {
    pub ws_url: Url,
    pub api_key: String,
    pub model: String,
    pub system_instruction: String,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("ws_url", &self.ws_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("system_instruction_len", &self.system_instruction.len())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl LiveConfig {
    pub fn production(
        api_key: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            ws_url: Url::parse(LIVE_WS_URL).context("parse live websocket url")?,
            api_key: api_key.into(),
            model: LIVE_MODEL.into(),
            system_instruction: system_instruction.into(),
            connect_timeout: Duration::from_secs(10),
        })
    }
}

/// Everything the live session reports, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    SetupComplete,
    Transcript { text: String },
    Audio { pcm_s16le: Vec<u8>, sample_rate_hz: u32 },
    Interrupted,
    TurnComplete,
    Warning { message: String },
    Error { message: String },
    Closed { reason: Option<String> },
}

#[derive(Debug)]
enum LiveCmd {
    AudioChunk { pcm_s16le: Vec<u8> },
    Shutdown,
}

#[derive(Clone)]
pub struct LiveHandle {
    tx: mpsc::Sender<LiveCmd>,
}

impl LiveHandle {
    pub fn try_send_audio_chunk(&self, pcm_s16le: Vec<u8>) -> bool {
        self.tx.try_send(LiveCmd::AudioChunk { pcm_s16le }).is_ok()
    }

    pub async fn send_audio_chunk(&self, pcm_s16le: Vec<u8>) -> bool {
        self.tx.send(LiveCmd::AudioChunk { pcm_s16le }).await.is_ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(LiveCmd::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub async fn spawn_live_session(
    cfg: LiveConfig,
) -> anyhow::Result<(LiveHandle, mpsc::Receiver<LiveEvent>)> {
    if cfg.api_key.trim().is_empty() {
        return Err(anyhow!("missing Gemini API key"));
    }

    let url = build_live_ws_url(&cfg);
    let req = url
        .as_str()
        .into_client_request()
        .context("build websocket request")?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<LiveCmd>(64);
    let (evt_tx, evt_rx) = mpsc::channel::<LiveEvent>(256);

    let (ws, _resp) = tokio::time::timeout(cfg.connect_timeout, tokio_tungstenite::connect_async(req))
        .await
        .map_err(|_| anyhow!("live session connect timed out"))?
        .context("connect live websocket")?;
    log::info!("live session connected");

    let (ws_write, mut ws_read) = ws.split();

    // Control frames (setup, pong) go out ahead of any queued audio.
    let (out_ctrl_tx, mut out_ctrl_rx) = mpsc::channel::<Message>(32);
    let (out_audio_tx, mut out_audio_rx) = mpsc::channel::<Message>(256);
    tokio::spawn(async move {
        let mut ws_write = ws_write;
        let mut ctrl_closed = false;
        let mut audio_closed = false;

        loop {
            let next_msg: Option<Message> = tokio::select! {
                biased;
                msg = out_ctrl_rx.recv(), if !ctrl_closed => {
                    match msg {
                        Some(m) => Some(m),
                        None => { ctrl_closed = true; None }
                    }
                }
                msg = out_audio_rx.recv(), if !audio_closed => {
                    match msg {
                        Some(m) => Some(m),
                        None => { audio_closed = true; None }
                    }
                }
            };

            let Some(msg) = next_msg else {
                if ctrl_closed && audio_closed {
                    break;
                }
                continue;
            };

            let res = tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(msg)).await;
            if !matches!(res, Ok(Ok(()))) {
                log::warn!("live session writer stopped: send failed or timed out");
                break;
            }
        }

        let _ = ws_write.send(Message::Close(None)).await;
    });

    out_ctrl_tx
        .send(Message::Text(build_setup_message(&cfg).into()))
        .await
        .map_err(|_| anyhow!("live session closed before setup"))?;

    tokio::spawn(async move {
        let mut dropped_outbound_audio_chunks: u64 = 0;
        let mut close_reason: Option<String> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    match cmd {
                        LiveCmd::AudioChunk { pcm_s16le } => {
                            let msg = build_realtime_input_message(&pcm_s16le);
                            match out_audio_tx.try_send(Message::Text(msg.into())) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    dropped_outbound_audio_chunks = dropped_outbound_audio_chunks.saturating_add(1);
                                    if should_emit_backpressure_warning(dropped_outbound_audio_chunks) {
                                        let _ = evt_tx.try_send(LiveEvent::Warning {
                                            message: format!(
                                                "live session backpressure: dropped {dropped_outbound_audio_chunks} audio chunks"
                                            ),
                                        });
                                    }
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    let _ = evt_tx.try_send(LiveEvent::Error { message: "websocket closed".into() });
                                    break;
                                }
                            }
                        }
                        LiveCmd::Shutdown => {
                            log::info!("live session shutdown requested");
                            break;
                        }
                    }
                }

                msg = ws_read.next() => {
                    let Some(msg) = msg else { break; };
                    let msg = match msg {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("live session read failed: {e}");
                            let _ = evt_tx.send(LiveEvent::Error { message: "websocket read failed".into() }).await;
                            break;
                        }
                    };

                    let text = match msg {
                        Message::Text(t) => t.to_string(),
                        // Server content sometimes arrives as binary JSON.
                        Message::Binary(b) => String::from_utf8_lossy(&b).to_string(),
                        Message::Close(frame) => {
                            close_reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.trim().is_empty());
                            break;
                        }
                        Message::Ping(p) => {
                            if out_ctrl_tx.try_send(Message::Pong(p)).is_err() {
                                let _ = evt_tx.try_send(LiveEvent::Error { message: "failed to send pong".into() });
                                break;
                            }
                            continue;
                        }
                        _ => continue,
                    };

                    let parsed = match parse_live_message(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            log::debug!("ignoring unreadable live frame: {e:#}");
                            continue;
                        }
                    };

                    for evt in parsed {
                        if evt_tx.send(evt).await.is_err() {
                            // Nobody is listening any more.
                            return;
                        }
                    }
                }
            }
        }

        if let Some(reason) = close_reason.as_deref() {
            log::info!("live session closed by server: {reason}");
        }
        let _ = evt_tx.send(LiveEvent::Closed { reason: close_reason }).await;
        // Dropping the outbound senders ends the writer task, which sends Close.
    });

    Ok((LiveHandle { tx: cmd_tx }, evt_rx))
}

fn build_live_ws_url(cfg: &LiveConfig) -> Url {
    let mut url = cfg.ws_url.clone();
    url.query_pairs_mut().append_pair("key", &cfg.api_key);
    url
}

fn build_setup_message(cfg: &LiveConfig) -> String {
    json!({
        "setup": {
            "model": cfg.model,
            "generationConfig": {"responseModalities": ["AUDIO"]},
            "systemInstruction": {"parts": [{"text": cfg.system_instruction}]},
            "outputAudioTranscription": {},
        }
    })
    .to_string()
}

fn build_realtime_input_message(pcm_s16le: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(pcm_s16le);
    json!({
        "realtimeInput": {
            "audio": {
                "data": b64,
                "mimeType": format!("audio/pcm;rate={INPUT_SAMPLE_RATE_HZ}"),
            }
        }
    })
    .to_string()
}

fn sample_rate_from_mime(mime: &str) -> u32 {
    mime.split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
        .unwrap_or(OUTPUT_SAMPLE_RATE_HZ)
}

/// Splits one server frame into events. Within a frame the order is
/// transcript, audio, interrupted, turn complete.
fn parse_live_message(s: &str) -> anyhow::Result<Vec<LiveEvent>> {
    let v: Value = serde_json::from_str(s).context("decode live json")?;
    let mut out = Vec::new();

    if v.get("setupComplete").is_some() {
        out.push(LiveEvent::SetupComplete);
    }

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("live session error")
            .to_string();
        out.push(LiveEvent::Error { message });
    }

    if let Some(content) = v.get("serverContent") {
        let transcript = content
            .pointer("/outputTranscription/text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty());
        if let Some(text) = transcript {
            out.push(LiveEvent::Transcript { text: text.to_string() });
        }

        let parts = content
            .pointer("/modelTurn/parts")
            .and_then(|p| p.as_array())
            .map(|p| p.as_slice())
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part.get("inlineData") else { continue };
            let Some(data) = inline.get("data").and_then(|d| d.as_str()) else { continue };
            // One bad part must not cost the frame its transcript or turn end.
            let pcm_s16le = match base64::engine::general_purpose::STANDARD.decode(data) {
                Ok(pcm) => pcm,
                Err(e) => {
                    log::warn!("skipping undecodable live audio part: {e}");
                    out.push(LiveEvent::Warning {
                        message: format!("skipped undecodable audio: {e}"),
                    });
                    continue;
                }
            };
            let sample_rate_hz = inline
                .get("mimeType")
                .and_then(|m| m.as_str())
                .map(sample_rate_from_mime)
                .unwrap_or(OUTPUT_SAMPLE_RATE_HZ);
            out.push(LiveEvent::Audio { pcm_s16le, sample_rate_hz });
        }

        if content.get("interrupted").and_then(|b| b.as_bool()) == Some(true) {
            out.push(LiveEvent::Interrupted);
        }
        if content.get("turnComplete").and_then(|b| b.as_bool()) == Some(true) {
            out.push(LiveEvent::TurnComplete);
        }
    }

    if v.get("goAway").is_some() {
        out.push(LiveEvent::Warning {
            message: "server is about to close the live session".into(),
        });
    }

    Ok(out)
}
