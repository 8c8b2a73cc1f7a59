use async_trait::async_trait;
use futures_util::StreamExt;
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// The connection could not be established.
    Handshake(String),
    /// An established connection failed.
    Transport(String),
}

impl ChannelError {
    pub fn category(&self) -> &'static str {
        "channel"
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Handshake(msg) => write!(f, "handshake failed: {}", msg),
            ChannelError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}

/// An open push connection delivering text payloads.
#[async_trait]
pub trait Transport: Send {
    /// Next payload; `None` once the remote side has closed.
    async fn next_text(&mut self) -> Option<Result<String, ChannelError>>;
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, ChannelError>;
}

/// Websocket connector over tokio-tungstenite.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, ChannelError> {
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Handshake(e.to_string()))?;
        Ok(Box::new(WsTransport { ws }))
    }
}

struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_text(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                // Undecodable bytes are left for the event decoder to reject.
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(ChannelError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
