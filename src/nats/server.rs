use anyhow::{Context, Result};
use async_nats::{Client, Message};
use futures::stream::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::channel::{MethodCall, MethodResponse, VoiceChannel};

/// Serves the voice channel over NATS request/reply
///
/// Each request payload is a JSON `MethodCall`; the JSON `MethodResponse` is
/// published on the request's reply subject. Requests are handled one at a
/// time in arrival order.
pub struct ChannelServer {
    client: Client,
    subject: String,
    channel: Arc<VoiceChannel>,
}

impl ChannelServer {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject: String, channel: Arc<VoiceChannel>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject,
            channel,
        })
    }

    /// Answer requests until `shutdown` resolves or the subscription ends
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .context("Failed to subscribe to channel subject")?;

        info!("Serving voice channel on NATS subject {}", self.subject);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                message = subscriber.next() => match message {
                    Some(message) => self.respond(message).await,
                    None => {
                        warn!("NATS subscription closed");
                        break;
                    }
                },
            }
        }

        if let Err(e) = subscriber.unsubscribe().await {
            warn!("Failed to unsubscribe from {}: {}", self.subject, e);
        }

        info!("NATS channel server stopped");
        Ok(())
    }

    async fn respond(&self, message: Message) {
        // Without a reply subject the caller could never receive its response
        let Some(reply) = message.reply else {
            warn!("Ignoring call on {} without a reply subject", message.subject);
            return;
        };

        let response = match MethodCall::from_json(&message.payload) {
            Ok(call) => self.channel.handle(call).await,
            Err(e) => {
                warn!("Malformed call on {}: {}", message.subject, e);
                MethodResponse::from(e)
            }
        };

        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode response: {}", e);
                return;
            }
        };

        if let Err(e) = self.client.publish(reply, payload.into()).await {
            error!("Failed to publish response: {}", e);
        }
    }
}
