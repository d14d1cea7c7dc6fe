use crate::state::{Notification, Snapshot};

/// Recovery connections needed before an account counts as backed up
pub const DEFAULT_RECOVERY_THRESHOLD: usize = 3;

/// 根据当前快照计算通知
pub fn derive_notifications(snapshot: &Snapshot, recovery_threshold: usize) -> Vec<Notification> {
    let mut notifications = Vec::new();

    let recovery_connections = snapshot.recovery_connections().len();
    if recovery_connections < recovery_threshold {
        notifications.push(Notification::BackupPending {
            recovery_connections,
            required: recovery_threshold,
        });
    }

    if !snapshot.user.sponsored {
        notifications.push(Notification::SponsorshipMissing);
    }

    notifications
}
