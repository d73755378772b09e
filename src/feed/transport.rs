//! Push channel transport
//!
//! Opens a WebSocket to the gateway, performs the STOMP handshake and
//! subscribes to the notification topic. Inbound `MESSAGE` bodies are
//! decoded into [`AlertEvent`]s.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::alert::AlertEvent;
use super::stomp::{Command, Frame};
use super::FeedError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SUBSCRIPTION_ID: &str = "sub-0";

/// Where and what to subscribe to
#[derive(Debug, Clone)]
pub struct PushEndpoint {
    /// WebSocket URL, e.g. `ws://localhost:8080/ws-notifications`
    pub url: String,
    /// STOMP destination, e.g. `/topic/notifications`
    pub topic: String,
}

impl PushEndpoint {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }

    /// Host header for the STOMP CONNECT frame
    fn host(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// An established topic subscription
pub struct PushSubscription {
    socket: Socket,
    topic: String,
}

impl PushSubscription {
    /// Connect, complete the STOMP handshake and subscribe
    pub async fn open(endpoint: &PushEndpoint) -> Result<Self, FeedError> {
        let (mut socket, _response) = connect_async(endpoint.url.as_str()).await?;

        socket
            .send(Message::Text(Frame::connect(&endpoint.host()).encode()))
            .await?;

        loop {
            let frame = match next_frame(&mut socket).await? {
                Some(frame) => frame,
                None => return Err(FeedError::Closed),
            };

            match frame.command {
                Command::Connected => {
                    tracing::debug!(
                        version = frame.get("version").unwrap_or("1.0"),
                        "STOMP session established"
                    );
                    break;
                }
                Command::Error => {
                    let message = frame.get("message").unwrap_or(&frame.body).to_string();
                    return Err(FeedError::Rejected(message));
                }
                other => {
                    tracing::debug!(command = %other, "Ignoring frame before CONNECTED");
                }
            }
        }

        socket
            .send(Message::Text(
                Frame::subscribe(SUBSCRIPTION_ID, &endpoint.topic).encode(),
            ))
            .await?;

        tracing::info!(url = %endpoint.url, topic = %endpoint.topic, "Subscribed to push notifications");

        Ok(Self {
            socket,
            topic: endpoint.topic.clone(),
        })
    }

    /// Wait for the next alert.
    ///
    /// Returns `None` once the channel is closed. Messages whose body is not
    /// a valid alert are logged and skipped.
    pub async fn next_event(&mut self) -> Option<Result<AlertEvent, FeedError>> {
        loop {
            let frame = match next_frame(&mut self.socket).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            match frame.command {
                Command::Message => match serde_json::from_str::<AlertEvent>(&frame.body) {
                    Ok(event) => return Some(Ok(event)),
                    Err(e) => {
                        tracing::warn!(
                            topic = %self.topic,
                            error = %e,
                            "Skipping undecodable alert payload"
                        );
                    }
                },
                Command::Error => {
                    let message = frame.get("message").unwrap_or(&frame.body).to_string();
                    return Some(Err(FeedError::Rejected(message)));
                }
                other => {
                    tracing::trace!(command = %other, "Ignoring frame");
                }
            }
        }
    }

    /// Unsubscribe, disconnect and close the socket
    pub async fn close(mut self) {
        let frames = [
            Frame::unsubscribe(SUBSCRIPTION_ID),
            Frame::disconnect("disconnect-0"),
        ];
        for frame in frames {
            if self.socket.send(Message::Text(frame.encode())).await.is_err() {
                break;
            }
        }

        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
        tracing::debug!(topic = %self.topic, "Push subscription closed");
    }
}

/// Read the next non-heart-beat STOMP frame. `Ok(None)` means closed.
async fn next_frame(socket: &mut Socket) -> Result<Option<Frame>, FeedError> {
    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!("Ignoring non UTF-8 binary message");
                    continue;
                }
            },
            Message::Close(_) => return Ok(None),
            _ => continue,
        };

        if let Some(frame) = Frame::decode(&text)? {
            return Ok(Some(frame));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_host() {
        let endpoint = PushEndpoint::new("ws://gateway.local:8080/ws-notifications", "/topic/n");
        assert_eq!(endpoint.host(), "gateway.local");

        let endpoint = PushEndpoint::new("garbage", "/topic/n");
        assert_eq!(endpoint.host(), "localhost");
    }

    #[tokio::test]
    async fn test_open_fails_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = PushEndpoint::new(format!("ws://{}/ws-notifications", addr), "/topic/n");
        let result = PushSubscription::open(&endpoint).await;
        assert!(matches!(result, Err(FeedError::Connect(_))));
    }
}
