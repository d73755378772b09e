//! STOMP push endpoint.
//!
//! A minimal single-topic broker: clients CONNECT, SUBSCRIBE to the
//! notification topic and receive every published alert as a `MESSAGE`
//! frame with a JSON body.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::state::GatewayState;
use crate::feed::stomp::{Command, Frame};
use crate::feed::AlertEvent;

/// WebSocket upgrade handler for the push channel
pub async fn push_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection STOMP state
#[derive(Debug, Default)]
pub(crate) struct StompSession {
    connected: bool,
    subscriptions: Vec<String>,
    next_message_id: u64,
}

/// What to do after handling a client frame
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Reply(Vec<Frame>),
    Close(Vec<Frame>),
}

impl StompSession {
    /// Apply one client frame
    pub(crate) fn handle(&mut self, frame: &Frame, topic: &str) -> Step {
        match frame.command {
            Command::Connect | Command::Stomp => {
                self.connected = true;
                Step::Reply(vec![Frame::connected()])
            }
            _ if !self.connected => Step::Close(vec![Frame::error("CONNECT expected")]),
            Command::Subscribe => {
                let (Some(id), Some(destination)) = (frame.get("id"), frame.get("destination"))
                else {
                    return Step::Close(vec![Frame::error("SUBSCRIBE requires id and destination")]);
                };
                if destination != topic {
                    return Step::Close(vec![Frame::error(&format!(
                        "Unknown destination {}",
                        destination
                    ))]);
                }
                if !self.subscriptions.iter().any(|s| s == id) {
                    self.subscriptions.push(id.to_string());
                }
                Step::Reply(receipt_for(frame))
            }
            Command::Unsubscribe => {
                if let Some(id) = frame.get("id") {
                    self.subscriptions.retain(|s| s != id);
                }
                Step::Reply(receipt_for(frame))
            }
            Command::Disconnect => {
                self.subscriptions.clear();
                Step::Close(receipt_for(frame))
            }
            other => Step::Close(vec![Frame::error(&format!("Unsupported frame {}", other))]),
        }
    }

    /// MESSAGE frames delivering `event` to every subscription
    pub(crate) fn deliver(&mut self, event: &AlertEvent, topic: &str) -> Vec<Frame> {
        if self.subscriptions.is_empty() {
            return Vec::new();
        }
        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize alert");
                return Vec::new();
            }
        };

        let mut frames = Vec::with_capacity(self.subscriptions.len());
        for subscription in &self.subscriptions {
            self.next_message_id += 1;
            frames.push(Frame::message(
                topic,
                subscription,
                &format!("msg-{}", self.next_message_id),
                &body,
            ));
        }
        frames
    }
}

fn receipt_for(frame: &Frame) -> Vec<Frame> {
    frame
        .get("receipt")
        .map(|r| vec![Frame::receipt(r)])
        .unwrap_or_default()
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut alerts = state.subscribe_alerts();
    let mut session = StompSession::default();
    let topic = state.config.topic.clone();

    tracing::debug!("Push client connected");

    loop {
        let outbound = tokio::select! {
            inbound = receiver.next() => {
                let text = match inbound {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Push socket receive error");
                        break;
                    }
                };

                match Frame::decode(&text) {
                    Ok(Some(frame)) => session.handle(&frame, &topic),
                    Ok(None) => continue,
                    Err(e) => Step::Close(vec![Frame::error(&e.to_string())]),
                }
            }
            alert = alerts.recv() => match alert {
                Ok(event) => Step::Reply(session.deliver(&event, &topic)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push client lagging, alerts dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        let (frames, close) = match outbound {
            Step::Reply(frames) => (frames, false),
            Step::Close(frames) => (frames, true),
        };

        let mut failed = false;
        for frame in frames {
            if sender.send(Message::Text(frame.encode())).await.is_err() {
                failed = true;
                break;
            }
        }
        if failed || close {
            break;
        }
    }

    let _ = sender.close().await;
    tracing::debug!("Push client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "/topic/notifications";

    fn alert() -> AlertEvent {
        AlertEvent {
            property_id: "METER-1".to_string(),
            kwh_used: 80.0,
            carbon_score: 20.0,
            recommendation_message: None,
            timestamp: 1,
        }
    }

    #[test]
    fn test_handshake_and_subscribe() {
        let mut session = StompSession::default();

        let step = session.handle(&Frame::connect("localhost"), TOPIC);
        assert_eq!(step, Step::Reply(vec![Frame::connected()]));

        assert!(session.deliver(&alert(), TOPIC).is_empty());

        let subscribe = Frame::subscribe("sub-0", TOPIC).header("receipt", "r-1");
        assert_eq!(
            session.handle(&subscribe, TOPIC),
            Step::Reply(vec![Frame::receipt("r-1")])
        );

        let frames = session.deliver(&alert(), TOPIC);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get("subscription"), Some("sub-0"));
        let event: AlertEvent = serde_json::from_str(&frames[0].body).unwrap();
        assert_eq!(event, alert());
    }

    #[test]
    fn test_frames_before_connect_are_rejected() {
        let mut session = StompSession::default();
        let step = session.handle(&Frame::subscribe("sub-0", TOPIC), TOPIC);
        assert!(matches!(step, Step::Close(frames) if frames[0].command == Command::Error));
    }

    #[test]
    fn test_unknown_destination_is_rejected() {
        let mut session = StompSession::default();
        session.handle(&Frame::connect("localhost"), TOPIC);
        let step = session.handle(&Frame::subscribe("sub-0", "/topic/other"), TOPIC);
        assert!(matches!(step, Step::Close(_)));
    }

    #[test]
    fn test_unsubscribe_and_disconnect() {
        let mut session = StompSession::default();
        session.handle(&Frame::connect("localhost"), TOPIC);
        session.handle(&Frame::subscribe("sub-0", TOPIC), TOPIC);

        session.handle(&Frame::unsubscribe("sub-0"), TOPIC);
        assert!(session.deliver(&alert(), TOPIC).is_empty());

        let step = session.handle(&Frame::disconnect("bye"), TOPIC);
        assert_eq!(step, Step::Close(vec![Frame::receipt("bye")]));
    }
}
