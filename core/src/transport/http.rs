use async_trait::async_trait;
use eventsource_client as es;
use eventsource_client::Client as _;
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::config::ClientConfig;
use crate::protocol::{Command, PushEvent, RawResponse};
use crate::transport::{PushSender, Subscription, Transport, TransportError};

pub const START_PATH: &str = "start_monitoring";
pub const STOP_PATH: &str = "stop_monitoring";
pub const EXPORT_PATH: &str = "export";
pub const EVENTS_PATH: &str = "events";

/// Commands over HTTP, push events over Server-Sent Events.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = ClientConfig::default();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reconnect_delay: defaults.reconnect_delay(),
            max_reconnect_delay: defaults.max_reconnect_delay(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.backend_url.clone())
            .with_reconnect(config.reconnect_delay(), config.max_reconnect_delay())
    }

    pub fn with_reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_command(&self, command: &Command) -> Result<RawResponse, TransportError> {
        let request = match command {
            Command::Start(parameters) => self.client.post(self.url(START_PATH)).json(parameters),
            Command::Stop => self
                .client
                .post(self.url(STOP_PATH))
                .json(&serde_json::json!({})),
            Command::Export(format) => self
                .client
                .get(self.url(&format!("{EXPORT_PATH}/{}", format.as_str()))),
        };
        debug!("sending {} command to {}", command.name(), self.base_url);

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, body.to_vec()))
    }

    fn subscribe(&self, events: PushSender) -> Subscription {
        let stream = EventStream {
            url: self.url(EVENTS_PATH),
            reconnect_delay: self.reconnect_delay,
            max_reconnect_delay: self.max_reconnect_delay,
        };
        Subscription::from_task(tokio::spawn(stream.run(events)))
    }
}

enum StreamEnd {
    ReceiverGone,
    Lost { connected: bool },
}

/// Reads the SSE endpoint, reconnecting with exponential backoff.
struct EventStream {
    url: String,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
}

impl EventStream {
    async fn run(self, events: PushSender) {
        info!("push channel subscribing to {}", self.url);
        let mut delay = self.reconnect_delay;
        let mut reported_down = false;

        loop {
            let client = match es::ClientBuilder::for_url(&self.url) {
                Ok(builder) => builder
                    .reconnect(es::ReconnectOptions::reconnect(false).build())
                    .build(),
                Err(err) => {
                    error!("push channel: invalid endpoint {}: {}", self.url, err);
                    return;
                }
            };

            match self.stream_events(&client, &events).await {
                StreamEnd::ReceiverGone => {
                    debug!("push channel: receiver dropped, stopping");
                    return;
                }
                StreamEnd::Lost { connected } => {
                    if connected {
                        delay = self.reconnect_delay;
                        reported_down = false;
                    }
                }
            }

            if !reported_down {
                if !events.send(PushEvent::Disconnected) {
                    return;
                }
                reported_down = true;
            }
            debug!("push channel: reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.max_reconnect_delay);
        }
    }

    async fn stream_events(&self, client: &impl es::Client, events: &PushSender) -> StreamEnd {
        let mut stream = client.stream();
        let mut connected = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(es::SSE::Connected(_)) => {
                    connected = true;
                    if !events.send(PushEvent::Connected) {
                        return StreamEnd::ReceiverGone;
                    }
                }
                Ok(es::SSE::Event(event)) => {
                    match PushEvent::decode(&event.event_type, &event.data) {
                        Ok(Some(push)) => {
                            if !events.send(push) {
                                return StreamEnd::ReceiverGone;
                            }
                        }
                        Ok(None) => debug!("push channel: ignoring '{}' event", event.event_type),
                        Err(err) => warn!("push channel: dropping event: {}", err),
                    }
                }
                Ok(es::SSE::Comment(_)) => debug!("push channel: keepalive"),
                Err(err) => {
                    warn!("push channel error: {}", err);
                    return StreamEnd::Lost { connected };
                }
            }
        }
        StreamEnd::Lost { connected }
    }
}
