//! Channel adapters: HTTP webhooks and a log-only fallback.

use std::sync::Arc;

use anyhow::{Context, bail};
use editorial_common::schedule::Channel;
use futures::FutureExt;
use futures::future::BoxFuture;
use itertools::Itertools;

use crate::domain::dispatch::{ChannelAdapter, ChannelError, ChannelPayload};
use crate::infrastructure::settings::ChannelSettings;

/// Posts the payload as JSON to the channel's endpoint.
///
/// The request itself has no timeout; attempts are bounded by the dispatcher.
pub struct WebhookChannel {
    channel: Channel,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(channel: Channel, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            channel,
            url: url.into(),
            client,
        }
    }

    async fn try_send(&self, payload: &ChannelPayload) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-editorial-channel", self.channel.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ChannelError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl ChannelAdapter for WebhookChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn publish<'a>(&'a self, payload: &'a ChannelPayload) -> BoxFuture<'a, Result<(), ChannelError>> {
        self.try_send(payload).boxed()
    }
}

/// Only logs what would have been sent. Useful for channels without an integration yet.
pub struct LogChannel {
    channel: Channel,
}

impl LogChannel {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

impl ChannelAdapter for LogChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn publish<'a>(&'a self, payload: &'a ChannelPayload) -> BoxFuture<'a, Result<(), ChannelError>> {
        tracing::info!(
            channel = %self.channel,
            article_id = %payload.article_id,
            title = %payload.content.title,
            "article distributed"
        );
        futures::future::ready(Ok(())).boxed()
    }
}

/// Builds one adapter per configured channel.
pub fn build_adapters(settings: &[ChannelSettings]) -> anyhow::Result<Vec<Arc<dyn ChannelAdapter>>> {
    let duplicates = settings.iter().map(|channel| channel.channel).duplicates().join(", ");
    if !duplicates.is_empty() {
        bail!("channels configured more than once: {duplicates}");
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("editorial-service/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client for channel webhooks")?;

    let adapters = settings
        .iter()
        .map(|channel| -> Arc<dyn ChannelAdapter> {
            match &channel.webhook_url {
                Some(url) => Arc::new(WebhookChannel::new(channel.channel, url, client.clone())),
                None => Arc::new(LogChannel::new(channel.channel)),
            }
        })
        .collect();

    Ok(adapters)
}
