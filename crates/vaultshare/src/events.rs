//! Notifications about sharing and deletion.
//!
//! Events are fire-and-forget. A failing sink is logged and otherwise
//! ignored; it never rolls back the operation that produced the event.

use tokio::sync::mpsc;

use vaultshare_core::{FileId, PermissionId, PermissionKind, ShareId, UserId};

/// Something other parts of the system may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// A link or user share was created or updated.
    ShareCreated {
        file_id: FileId,
        share_id: ShareId,
        created_by: UserId,
        /// `None` for link shares.
        recipient: Option<UserId>,
        expires_at: Option<i64>,
    },
    /// A permission entry was granted or its expiry changed.
    PermissionGranted {
        file_id: FileId,
        permission_id: PermissionId,
        user: UserId,
        kind: PermissionKind,
        granted_by: UserId,
    },
    PermissionRevoked {
        file_id: FileId,
        permission_id: PermissionId,
        user: UserId,
        revoked_by: UserId,
    },
    ShareRevoked {
        file_id: FileId,
        share_id: ShareId,
        revoked_by: UserId,
    },
    FileDeleted {
        file_id: FileId,
        deleted_by: UserId,
    },
}

impl VaultEvent {
    /// The file the event concerns.
    pub fn file_id(&self) -> FileId {
        match self {
            Self::ShareCreated { file_id, .. }
            | Self::PermissionGranted { file_id, .. }
            | Self::PermissionRevoked { file_id, .. }
            | Self::ShareRevoked { file_id, .. }
            | Self::FileDeleted { file_id, .. } => *file_id,
        }
    }
}

/// Receives vault events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn publish(&self, event: &VaultEvent) -> anyhow::Result<()>;
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: &VaultEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<VaultEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<VaultEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &VaultEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::channel();
        let event = VaultEvent::FileDeleted {
            file_id: FileId::from_bytes([1; 16]),
            deleted_by: UserId(1),
        };

        sink.publish(&event).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event);
        assert_eq!(event.file_id(), FileId::from_bytes([1; 16]));
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        let event = VaultEvent::FileDeleted {
            file_id: FileId::from_bytes([1; 16]),
            deleted_by: UserId(1),
        };
        assert!(sink.publish(&event).is_err());
    }
}
