//! C8 — Mailbox.
//!
//! Per-recipient inbox of typed messages, with at-most-once delivery via
//! a `read` flag and an async `poll` that waits (with periodic recheck)
//! up to a caller-supplied timeout for the next unread message.

use crate::clock::Clock;
use crate::model::mailbox::{Inbox, Message, MessageType};
use crate::paths::Paths;
use crate::store::{AtomicStore, StoreError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("message not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type MailboxResult<T> = Result<T, MailboxError>;

/// Default interval between recheck attempts inside `poll`.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Mailbox<'a, C: Clock> {
    store: AtomicStore,
    paths: &'a Paths,
    clock: &'a C,
}

impl<'a, C: Clock> Mailbox<'a, C> {
    pub fn new(paths: &'a Paths, clock: &'a C) -> Self {
        Self {
            store: AtomicStore::new(),
            paths,
            clock,
        }
    }

    pub fn send(
        &self,
        project: &str,
        team: &str,
        from: &str,
        to: &str,
        kind: MessageType,
        payload: serde_json::Value,
    ) -> MailboxResult<Message> {
        let path = self.paths.inbox_file(project, team, to);
        let message = Message {
            id: Uuid::new_v4().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            kind,
            payload,
            timestamp: self.clock.now(),
            read: false,
        };
        let sent = message.clone();
        self.store.update::<Inbox, _>(&path, |existing| {
            let mut inbox = existing.unwrap_or_default();
            inbox.messages.push(message);
            Ok(inbox)
        })?;
        Ok(sent)
    }

    /// Unread messages for `recipient`, optionally filtered by type, in
    /// insertion order. Does not mark anything read — callers that want
    /// at-most-once delivery should follow up with `mark_read`.
    pub fn peek(
        &self,
        project: &str,
        team: &str,
        recipient: &str,
        type_filter: Option<MessageType>,
    ) -> MailboxResult<Vec<Message>> {
        let inbox = self.load(project, team, recipient)?;
        Ok(inbox
            .messages
            .into_iter()
            .filter(|m| !m.read)
            .filter(|m| type_filter.map(|f| f == m.kind).unwrap_or(true))
            .collect())
    }

    pub fn mark_read(&self, project: &str, team: &str, recipient: &str, message_id: &str) -> MailboxResult<()> {
        let path = self.paths.inbox_file(project, team, recipient);
        self.store.update::<Inbox, _>(&path, |existing| {
            let mut inbox = existing.ok_or_else(|| StoreError::NotFound(path.clone()))?;
            let msg = inbox
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| StoreError::Corrupt {
                    path: path.clone(),
                    reason: format!("message_not_found|{message_id}"),
                })?;
            msg.read = true;
            Ok(inbox)
        }).map_err(|e| match &e {
            StoreError::Corrupt { reason, .. } if reason.starts_with("message_not_found|") => {
                MailboxError::NotFound(message_id.to_string())
            }
            _ => MailboxError::Store(e),
        })?;
        Ok(())
    }

    /// Wait up to `timeout` for at least one unread message (optionally
    /// type-filtered), rechecking every [`POLL_INTERVAL`]. Claims and
    /// marks read whatever matches under a single lock acquisition, so
    /// concurrent pollers each observe a disjoint subset (at-most-once
    /// delivery) rather than racing over the same unread messages.
    pub async fn poll(
        &self,
        project: &str,
        team: &str,
        recipient: &str,
        type_filter: Option<MessageType>,
        timeout: Duration,
    ) -> MailboxResult<Vec<Message>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let claimed = self.claim_unread(project, team, recipient, type_filter)?;
            if !claimed.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(claimed);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
        }
    }

    /// Under a single lock: mark every unread message matching
    /// `type_filter` as read, and return the (now-read) messages that
    /// were claimed this way.
    fn claim_unread(
        &self,
        project: &str,
        team: &str,
        recipient: &str,
        type_filter: Option<MessageType>,
    ) -> MailboxResult<Vec<Message>> {
        let path = self.paths.inbox_file(project, team, recipient);
        let mut claimed = Vec::new();
        self.store.update::<Inbox, _>(&path, |existing| {
            let mut inbox = existing.unwrap_or_default();
            for m in inbox.messages.iter_mut() {
                if !m.read && type_filter.map(|f| f == m.kind).unwrap_or(true) {
                    m.read = true;
                    claimed.push(m.clone());
                }
            }
            Ok(inbox)
        })?;
        Ok(claimed)
    }

    fn load(&self, project: &str, team: &str, recipient: &str) -> MailboxResult<Inbox> {
        let path = self.paths.inbox_file(project, team, recipient);
        match self.store.read_json_opt::<Inbox>(&path)? {
            Some(inbox) => Ok(inbox),
            None => Ok(Inbox::default()),
        }
    }
}
