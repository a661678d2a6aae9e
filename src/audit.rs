//! Audit trails
//!
//! Every mutable entity carries an [`AuditTrail`]: who created it, every
//! mutation since (append-only, most-recent-last), and an optional
//! soft-delete marker. Entries are never reordered or rewritten; the fields
//! are private so the only way in is through the recording methods.

use jiff::{Timestamp, Zoned};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by audit-trail guards.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    /// Hard deletion was attempted on an entity that was never soft-deleted.
    #[error("entity is not soft-deleted; hard delete requires a prior soft delete")]
    NotSoftDeleted,
}

/// A single actor/timestamp pair in a trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The account that performed the action.
    pub actor: Uuid,

    /// When the action happened (server clock, never client-supplied).
    pub at: Timestamp,
}

impl AuditEntry {
    /// Creates an entry for `actor` at the given instant.
    #[must_use]
    pub fn new(actor: Uuid, now: &Zoned) -> Self {
        Self {
            actor,
            at: now.timestamp(),
        }
    }
}

/// Append-only create/update/delete history for a mutable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    created: AuditEntry,
    updated: Vec<AuditEntry>,
    deleted: Option<AuditEntry>,
}

impl AuditTrail {
    /// Starts a trail for a freshly created entity.
    #[must_use]
    pub fn new(actor: Uuid, now: &Zoned) -> Self {
        Self {
            created: AuditEntry::new(actor, now),
            updated: Vec::new(),
            deleted: None,
        }
    }

    /// Appends an update entry. One call per mutation; entries are never
    /// merged or collapsed.
    pub fn record_update(&mut self, actor: Uuid, now: &Zoned) {
        self.updated.push(AuditEntry::new(actor, now));
    }

    /// Marks the entity soft-deleted. Re-deleting an already deleted entity
    /// keeps the original deletion entry.
    pub fn record_delete(&mut self, actor: Uuid, now: &Zoned) {
        if self.deleted.is_none() {
            self.deleted = Some(AuditEntry::new(actor, now));
        }
    }

    /// Clears the soft-delete marker. The update history is untouched.
    pub fn restore(&mut self) {
        self.deleted = None;
    }

    /// Whether the entity is currently soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Guard for hard deletion: only an already soft-deleted entity may be
    /// purged.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NotSoftDeleted`] when the entity is live.
    pub fn ensure_purgeable(&self) -> Result<(), AuditError> {
        if self.is_deleted() {
            Ok(())
        } else {
            Err(AuditError::NotSoftDeleted)
        }
    }

    /// The creation entry.
    #[must_use]
    pub fn created(&self) -> &AuditEntry {
        &self.created
    }

    /// The update entries, oldest first.
    #[must_use]
    pub fn updated(&self) -> &[AuditEntry] {
        &self.updated
    }

    /// The soft-delete entry, if any.
    #[must_use]
    pub fn deleted(&self) -> Option<&AuditEntry> {
        self.deleted.as_ref()
    }

    /// Instant of the most recent mutation: the last update entry if any,
    /// otherwise the creation instant.
    #[must_use]
    pub fn last_touched(&self) -> Timestamp {
        self.updated
            .last()
            .map_or(self.created.at, |entry| entry.at)
    }
}
