use crate::models::db_operations::baas_client::BaasClient;
use crate::realtime::channel::{ChangeFilter, ChannelState, Incoming, PhoenixMessage, HEARTBEAT_INTERVAL};
use crate::realtime::ChangeEvent;
use actix_codec::Framed;
use awc::ws::{Codec, Frame, Message};
use awc::BoxedSocket;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::time::{interval, Interval, MissedTickBehavior};

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Could not connect to the realtime service: {0}")]
    Connect(String),
    #[error("Realtime socket error: {0}")]
    Socket(String),
    #[error("Malformed realtime frame: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("Subscription rejected: {0}")]
    Rejected(String),
    #[error("Realtime channel closed")]
    Closed,
}

/// One websocket joined to one channel.
pub struct RealtimeSocket {
    framed: Framed<BoxedSocket, Codec>,
    channel: ChannelState,
    heartbeat: Interval,
}

impl RealtimeSocket {
    /// Connects and sends the join. The join reply is handled by
    /// [`next_change`](Self::next_change) like any other frame.
    pub async fn open(
        client: &BaasClient,
        name: &str,
        filter: &ChangeFilter,
        access_token: Option<&str>,
    ) -> Result<Self, RealtimeError> {
        let (_response, framed) = awc::Client::default()
            .ws(client.realtime_url())
            .connect()
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        heartbeat.reset();

        let mut socket = Self { framed, channel: ChannelState::new(name), heartbeat };
        let join = socket.channel.join_message(filter, access_token);
        socket.send(&join).await?;
        log::debug!("Joined realtime channel {}", socket.channel.topic());
        Ok(socket)
    }

    async fn send(&mut self, message: &PhoenixMessage) -> Result<(), RealtimeError> {
        let text = serde_json::to_string(message)?;
        self.framed
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RealtimeError::Socket(e.to_string()))
    }

    /// Waits for the next row change, keeping the connection alive meanwhile.
    pub async fn next_change(&mut self) -> Result<ChangeEvent, RealtimeError> {
        loop {
            tokio::select! {
                _ = self.heartbeat.tick() => {
                    let beat = self.channel.heartbeat_message();
                    self.send(&beat).await?;
                }
                frame = self.framed.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(RealtimeError::Socket(e.to_string())),
                        None => return Err(RealtimeError::Closed),
                    };
                    match frame {
                        Frame::Text(bytes) => {
                            let text = String::from_utf8_lossy(&bytes);
                            match self.channel.interpret(&text)? {
                                Incoming::Change(change) => return Ok(change),
                                Incoming::JoinRejected(reason) => return Err(RealtimeError::Rejected(reason)),
                                Incoming::Closed => return Err(RealtimeError::Closed),
                                Incoming::JoinAccepted => log::debug!("Subscribed to {}", self.channel.topic()),
                                Incoming::Other => {}
                            }
                        }
                        Frame::Ping(payload) => {
                            self.framed
                                .send(Message::Pong(payload))
                                .await
                                .map_err(|e| RealtimeError::Socket(e.to_string()))?;
                        }
                        Frame::Close(_) => return Err(RealtimeError::Closed),
                        _ => {}
                    }
                }
            }
        }
    }

    pub async fn close(mut self) {
        if let Err(e) = self.framed.send(Message::Close(None)).await {
            log::debug!("Error while closing realtime socket: {}", e);
        }
    }
}
