// SPDX-License-Identifier: MIT
//! DevTools protocol wire client.
//!
//! One WebSocket connection to the browser carries everything: id-matched
//! command/response pairs plus unsolicited events, optionally tagged with the
//! session id of a page target. A background reader task routes responses to
//! the waiting caller through oneshot channels and fans events out on a
//! broadcast channel. Callers that need an event must subscribe *before*
//! triggering the action, the channel does not replay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, (i64, String)>>>>>;

/// Errors from the DevTools connection.
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("connecting to browser devtools failed: {0}")]
    Connect(String),

    #[error("devtools call {method} failed: {message} (code {code})")]
    Protocol {
        method: String,
        code: i64,
        message: String,
    },

    #[error("devtools wait for {0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("browser connection closed")]
    ConnectionClosed,

    #[error("unexpected devtools payload: {0}")]
    InvalidPayload(String),
}

/// An unsolicited event from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Method name, e.g. `Page.loadEventFired` or `Browser.downloadProgress`.
    pub method: String,
    /// Session the event belongs to; `None` for browser-level events.
    pub session_id: Option<String>,
    /// Event parameters.
    pub params: Value,
}

/// Routed form of one incoming text frame.
#[derive(Debug)]
enum Incoming {
    Response {
        id: u64,
        result: Result<Value, (i64, String)>,
    },
    Event(CdpEvent),
}

/// Classify one incoming frame. Pure; the reader task applies the result.
fn route_message(text: &str) -> Result<Incoming, CdpError> {
    let v: Value =
        serde_json::from_str(text).map_err(|e| CdpError::InvalidPayload(e.to_string()))?;

    if let Some(id) = v.get("id").and_then(Value::as_u64) {
        let result = match v.get("error") {
            Some(err) => {
                let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown devtools error")
                    .to_string();
                Err((code, message))
            }
            None => Ok(v.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Ok(Incoming::Response { id, result });
    }

    match v.get("method").and_then(Value::as_str) {
        Some(method) => Ok(Incoming::Event(CdpEvent {
            method: method.to_string(),
            session_id: v
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string),
            params: v.get("params").cloned().unwrap_or(Value::Null),
        })),
        None => Err(CdpError::InvalidPayload(
            "frame has neither id nor method".to_string(),
        )),
    }
}

/// The shared DevTools connection.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct CdpClient {
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    events: broadcast::Sender<CdpEvent>,
    next_id: AtomicU64,
    call_timeout: Duration,
    reader: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the browser's DevTools WebSocket endpoint.
    pub async fn connect(ws_url: &str, call_timeout: Duration) -> Result<Self, CdpError> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| CdpError::Connect(e.to_string()))?;
        let (sink, mut stream) = ws.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(1024);

        let reader_pending = pending.clone();
        let reader_events = events.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    // Binary/ping/pong frames are not part of the protocol.
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(err = %e, "devtools socket error");
                        break;
                    }
                };
                match route_message(&text) {
                    Ok(Incoming::Response { id, result }) => {
                        let sender = reader_pending.lock().await.remove(&id);
                        match sender {
                            Some(tx) => {
                                let _ = tx.send(result);
                            }
                            None => debug!(id, "devtools response for unknown call id"),
                        }
                    }
                    Ok(Incoming::Event(event)) => {
                        trace!(method = %event.method, "devtools event");
                        // Send errors mean no subscribers, which is fine.
                        let _ = reader_events.send(event);
                    }
                    Err(e) => debug!(err = %e, "ignoring unparseable devtools frame"),
                }
            }
            // Connection gone: dropping the senders wakes every waiting
            // caller with a ConnectionClosed error.
            reader_pending.lock().await.clear();
            debug!("devtools reader task finished");
        });

        Ok(Self {
            sink: Mutex::new(sink),
            pending,
            events,
            next_id: AtomicU64::new(1),
            call_timeout,
            reader,
        })
    }

    /// Subscribe to the event stream.
    ///
    /// Subscribe before issuing the command that triggers the event you wait
    /// for; the channel only buffers events sent after subscription.
    pub fn events(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Issue one command and wait for its response.
    ///
    /// `session_id` targets a page session (from `Target.attachToTarget`);
    /// `None` addresses the browser itself.
    pub async fn call(
        &self,
        method: &str,
        session_id: Option<&str>,
        params: Value,
    ) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(sid) = session_id {
            frame["sessionId"] = Value::String(sid.to_string());
        }

        trace!(id, method, "devtools call");
        let sent = self
            .sink
            .lock()
            .await
            .send(Message::Text(frame.to_string()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            debug!(err = %e, method, "devtools send failed");
            return Err(CdpError::ConnectionClosed);
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err((code, message)))) => Err(CdpError::Protocol {
                method: method.to_string(),
                code,
                message,
            }),
            Ok(Err(_recv)) => Err(CdpError::ConnectionClosed),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(CdpError::Timeout(method.to_string(), self.call_timeout))
            }
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Wait on an already-subscribed receiver for the first event matching `pred`.
///
/// `what` names the awaited event in timeout errors. Lagged subscribers log
/// and keep reading; a closed channel means the connection died.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<CdpEvent>,
    timeout: Duration,
    what: &str,
    pred: F,
) -> Result<CdpEvent, CdpError>
where
    F: Fn(&CdpEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(CdpError::Timeout(what.to_string(), timeout));
        }
        match tokio::time::timeout(deadline - now, rx.recv()).await {
            Ok(Ok(event)) => {
                if pred(&event) {
                    return Ok(event);
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!(skipped, "devtools event subscriber lagged");
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                return Err(CdpError::ConnectionClosed)
            }
            Err(_elapsed) => return Err(CdpError::Timeout(what.to_string(), timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_successful_response() {
        let incoming =
            route_message(r#"{"id":7,"result":{"targetId":"abc"}}"#).unwrap();
        match incoming {
            Incoming::Response { id, result } => {
                assert_eq!(id, 7);
                assert_eq!(result.unwrap()["targetId"], "abc");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn routes_error_response() {
        let incoming = route_message(
            r#"{"id":3,"error":{"code":-32000,"message":"No target with given id"}}"#,
        )
        .unwrap();
        match incoming {
            Incoming::Response { id, result } => {
                assert_eq!(id, 3);
                let (code, message) = result.unwrap_err();
                assert_eq!(code, -32000);
                assert_eq!(message, "No target with given id");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn routes_session_tagged_event() {
        let incoming = route_message(
            r#"{"method":"Page.loadEventFired","sessionId":"S1","params":{"timestamp":1.5}}"#,
        )
        .unwrap();
        match incoming {
            Incoming::Event(event) => {
                assert_eq!(event.method, "Page.loadEventFired");
                assert_eq!(event.session_id.as_deref(), Some("S1"));
                assert_eq!(event.params["timestamp"], 1.5);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(route_message("not json").is_err());
        assert!(route_message(r#"{"neither":"id nor method"}"#).is_err());
    }

    #[tokio::test]
    async fn wait_for_event_skips_non_matching() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(CdpEvent {
            method: "Browser.downloadProgress".to_string(),
            session_id: None,
            params: json!({ "state": "inProgress" }),
        })
        .unwrap();
        tx.send(CdpEvent {
            method: "Browser.downloadProgress".to_string(),
            session_id: None,
            params: json!({ "state": "completed" }),
        })
        .unwrap();

        let event = wait_for_event(&mut rx, Duration::from_secs(1), "completion", |e| {
            e.params["state"] == "completed"
        })
        .await
        .unwrap();
        assert_eq!(event.params["state"], "completed");
    }

    #[tokio::test]
    async fn wait_for_event_times_out() {
        let (tx, mut rx) = broadcast::channel::<CdpEvent>(8);
        let err = wait_for_event(&mut rx, Duration::from_millis(20), "nothing", |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, CdpError::Timeout(_, _)));
        drop(tx);
    }
}
