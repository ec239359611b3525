//! Minimal Chrome DevTools Protocol client.
//!
//! One WebSocket per browser. Commands are JSON-RPC requests correlated by
//! id; responses complete a `oneshot`, events fan out on a `broadcast`
//! channel. Page commands are routed with flattened `sessionId`s.

use super::BrowserError;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, BrowserError>>>>>;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct CdpEvent {
    pub method: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcError>,
    method: Option<String>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub(crate) struct CdpConnection {
    next_id: AtomicU64,
    pending: Pending,
    sink: tokio::sync::Mutex<WsSink>,
    events: broadcast::Sender<CdpEvent>,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
        let (sink, mut source) = stream.split();
        let pending: Pending = Arc::default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let pending2 = pending.clone();
        let events2 = events.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let frame: Frame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::debug!("ignoring malformed DevTools frame: {e}");
                        continue;
                    }
                };
                dispatch(frame, &pending2, &events2);
            }
            // Nothing will answer outstanding requests once the socket is gone.
            let drained: Vec<_> = match pending2.lock() {
                Ok(mut map) => map.drain().collect(),
                Err(_) => Vec::new(),
            };
            for (_, tx) in drained {
                let _ = tx.send(Err(BrowserError::Closed));
            }
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            sink: tokio::sync::Mutex::new(sink),
            events,
            reader,
        })
    }

    /// Subscribe before issuing the command whose events you need.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    pub async fn send(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut request = json!({ "id": id, "method": method, "params": params });
        if let Some(sid) = session_id {
            request["sessionId"] = Value::String(sid.to_owned());
        }

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| BrowserError::Closed)?
            .insert(id, tx);

        let sent = self
            .sink
            .lock()
            .await
            .send(Message::Text(request.to_string()))
            .await;
        if let Err(e) = sent {
            if let Ok(mut map) = self.pending.lock() {
                map.remove(&id);
            }
            return Err(e.into());
        }

        rx.await.map_err(|_| BrowserError::Closed)?
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn dispatch(frame: Frame, pending: &Pending, events: &broadcast::Sender<CdpEvent>) {
    if let Some(id) = frame.id {
        let responder = pending.lock().ok().and_then(|mut map| map.remove(&id));
        if let Some(tx) = responder {
            let outcome = match frame.error {
                Some(err) => Err(BrowserError::Protocol {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(frame.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(outcome);
        }
        return;
    }

    if let Some(method) = frame.method {
        // No subscribers is the common case between navigations.
        let _ = events.send(CdpEvent {
            method,
            session_id: frame.session_id,
        });
    }
}
