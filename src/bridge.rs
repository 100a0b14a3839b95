//! Line-delimited JSON bridge between an out-of-process host shim and the
//! dispatcher.
//!
//! Each input line describes one event and the message item it was raised
//! on. Events run concurrently; each produces exactly one output line once
//! its handler completes it, so responses arrive in completion order and are
//! correlated by `requestId`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::host::{Dispatcher, EventCompletion, HostError, MailboxItem, NotificationMessage};

/// Message item state supplied by the host shim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    #[serde(default)]
    pub body: Option<String>,
    /// Set when the host failed to read the body.
    #[serde(default)]
    pub body_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub handler: String,
    #[serde(default)]
    pub item: ItemSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<EventCompletion>,
    /// Notifications left on the item, by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notifications: BTreeMap<String, NotificationMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    fn error(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// An in-memory message item backed by an [`ItemSnapshot`]. Notifications
/// are kept by key, so posting under an existing key replaces it.
#[derive(Debug, Default)]
pub struct ScriptedItem {
    snapshot: ItemSnapshot,
    notifications: Mutex<BTreeMap<String, NotificationMessage>>,
}

impl ScriptedItem {
    pub fn new(snapshot: ItemSnapshot) -> Self {
        Self {
            snapshot,
            notifications: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_body(body: impl Into<String>) -> Self {
        Self::new(ItemSnapshot {
            body: Some(body.into()),
            body_error: None,
        })
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(ItemSnapshot {
            body: None,
            body_error: Some(reason.into()),
        })
    }

    pub fn notifications(&self) -> BTreeMap<String, NotificationMessage> {
        match self.notifications.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl MailboxItem for ScriptedItem {
    async fn body_text(&self) -> Result<Option<String>, HostError> {
        match &self.snapshot.body_error {
            Some(reason) => Err(HostError::BodyFetch(reason.clone())),
            None => Ok(self.snapshot.body.clone()),
        }
    }

    async fn replace_notification(
        &self,
        key: &str,
        message: NotificationMessage,
    ) -> Result<(), HostError> {
        let mut guard = self
            .notifications
            .lock()
            .map_err(|_| HostError::Notification("notification store poisoned".into()))?;
        guard.insert(key.to_owned(), message);
        Ok(())
    }
}

/// Run one request through the dispatcher and wait for its completion.
pub async fn handle_request(dispatcher: &Dispatcher, req: BridgeRequest) -> BridgeResponse {
    let item = Arc::new(ScriptedItem::new(req.item));
    let pending = match dispatcher.dispatch(&req.handler, item.clone()).await {
        Ok(pending) => pending,
        Err(err) => {
            tracing::warn!(handler = %req.handler, error = %err, "dispatch failed");
            return BridgeResponse::error(req.request_id, err.to_string());
        }
    };
    match pending.wait().await {
        Ok(completion) => BridgeResponse {
            request_id: req.request_id,
            handler: Some(req.handler),
            completion,
            notifications: item.notifications(),
            error: None,
        },
        Err(err) => BridgeResponse::error(req.request_id, err.to_string()),
    }
}

/// Read requests from `reader` until end of input and write one response
/// line per request to `writer`. Returns after every in-flight event has been
/// answered.
pub async fn serve_lines<R, W>(
    dispatcher: Arc<Dispatcher>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<BridgeResponse>();
    // Dropped at end of input; the channel then closes once every spawned
    // request has sent its response.
    let mut tx = Some(tx);
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if let Some(tx) = &tx {
                            spawn_request(&dispatcher, tx, &line);
                        }
                    }
                    None => tx = None,
                }
            }
            resp = rx.recv() => match resp {
                Some(resp) => write_response(&mut writer, &resp).await?,
                None => break,
            },
        }
    }
    writer.flush().await
}

fn spawn_request(
    dispatcher: &Arc<Dispatcher>,
    tx: &mpsc::UnboundedSender<BridgeResponse>,
    line: &str,
) {
    let req = match serde_json::from_str::<BridgeRequest>(line) {
        Ok(req) => req,
        Err(err) => {
            tracing::warn!(error = %err, "malformed bridge request");
            let _ = tx.send(BridgeResponse::error(None, format!("malformed request: {}", err)));
            return;
        }
    };
    let dispatcher = dispatcher.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let resp = handle_request(&dispatcher, req).await;
        let _ = tx.send(resp);
    });
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    resp: &BridgeResponse,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(resp)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
