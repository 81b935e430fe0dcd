//! Control messages from pages to the gateway.
//!
//! Messages travel over a bounded channel to a single dispatch loop; each carries a
//! oneshot for its reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::Gateway;
use super::lifecycle::LifecycleState;
use super::stats::StatsSnapshot;
use crate::cache::{DataPolicy, Partition, SweepReport};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate an installed gateway without waiting.
    SkipWaiting,
    GetStatus,
    /// Empty one partition, or all of them when `namespace` is absent.
    ClearCache {
        #[serde(default)]
        namespace: Option<String>,
    },
    RunMaintenance,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SkipWaiting => "SKIP_WAITING",
            ClientMessage::GetStatus => "GET_STATUS",
            ClientMessage::ClearCache { .. } => "CLEAR_CACHE",
            ClientMessage::RunMaintenance => "RUN_MAINTENANCE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayReply {
    Ack { action: &'static str },
    Status(StatusSnapshot),
    Cleared(ClearReport),
    Maintenance(SweepReport),
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub version: String,
    pub state: LifecycleState,
    pub stats: StatsSnapshot,
    pub namespaces: Vec<NamespaceStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStatus {
    pub name: String,
    pub partition: Partition,
    pub entries: usize,
    pub max_entries: usize,
    pub max_age_seconds: u64,
    pub policy: DataPolicy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    pub namespaces: Vec<String>,
    pub entries: usize,
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("gateway message loop has stopped")]
    Closed,
    #[error("gateway dropped the reply")]
    NoReply,
}

pub struct Envelope {
    pub message: ClientMessage,
    pub reply: oneshot::Sender<GatewayReply>,
}

/// Cloneable handle for posting messages to the dispatch loop.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Envelope>,
}

impl MessageSender {
    pub async fn request(&self, message: ClientMessage) -> Result<GatewayReply, MessageError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| MessageError::Closed)?;
        rx.await.map_err(|_| MessageError::NoReply)
    }
}

pub fn channel(capacity: usize) -> (MessageSender, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessageSender { tx }, rx)
}

/// Dispatch messages until every sender is dropped.
pub async fn run_message_loop(gateway: Arc<Gateway>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { message, reply }) = rx.recv().await {
        let kind = message.kind();
        debug!(message = kind, "dispatching client message");
        let outcome = gateway.dispatch(message).await;
        if reply.send(outcome).is_err() {
            debug!(message = kind, "client went away before the reply");
        }
    }
    info!("message loop stopped");
}
