//! Customer complaints about purchases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{TxId, UserId};
use crate::ports::{ComplaintStore, StoreError, bounded};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    PaymentIssue,
    TokenNotWorking,
    WrongAmount,
    ServiceIssue,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }

    /// Open may move to any other state; InProgress only to a terminal one.
    pub fn can_move_to(self, next: ComplaintStatus) -> bool {
        use ComplaintStatus::*;
        matches!(
            (self, next),
            (Open, InProgress) | (Open, Resolved) | (Open, Closed)
                | (InProgress, Resolved) | (InProgress, Closed)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComplaintError {
    #[error("complaint subject is required")]
    EmptySubject,
    #[error("complaint description is required")]
    EmptyDescription,
    #[error("cannot move complaint from {from:?} to {to:?}")]
    InvalidTransition {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },
    #[error("complaint {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A status change made by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: ComplaintStatus,
    pub admin_notes: Option<String>,
    /// Kept only when `status` is terminal.
    pub resolution: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: ComplaintStatus) -> Self {
        Self {
            status,
            admin_notes: None,
            resolution: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.admin_notes = Some(notes.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub user_id: UserId,
    pub transaction_id: Option<TxId>,
    pub complaint_type: ComplaintType,
    pub subject: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub priority: Priority,
    /// Admin handling the complaint.
    pub assigned_to: Option<UserId>,
    pub admin_notes: Option<String>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    /// File a new complaint: open, medium priority, unassigned.
    pub fn open(
        user_id: UserId,
        complaint_type: ComplaintType,
        subject: &str,
        description: &str,
        transaction_id: Option<TxId>,
    ) -> Result<Self, ComplaintError> {
        let subject = subject.trim();
        let description = description.trim();
        if subject.is_empty() {
            return Err(ComplaintError::EmptySubject);
        }
        if description.is_empty() {
            return Err(ComplaintError::EmptyDescription);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            transaction_id,
            complaint_type,
            subject: subject.to_string(),
            description: description.to_string(),
            status: ComplaintStatus::Open,
            priority: Priority::default(),
            assigned_to: None,
            admin_notes: None,
            resolution: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `update.status`. Reaching a terminal state stamps `resolved_at`
    /// and records the resolution.
    pub fn transition(&mut self, update: StatusUpdate) -> Result<(), ComplaintError> {
        let next = update.status;
        if !self.status.can_move_to(next) {
            return Err(ComplaintError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        if update.admin_notes.is_some() {
            self.admin_notes = update.admin_notes;
        }
        if next.is_terminal() {
            self.resolution = update.resolution;
            self.resolved_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Hand to an admin; an open complaint starts progressing.
    pub fn assign(&mut self, admin: UserId) -> Result<(), ComplaintError> {
        if self.status.is_terminal() {
            return Err(ComplaintError::InvalidTransition {
                from: self.status,
                to: ComplaintStatus::InProgress,
            });
        }
        self.assigned_to = Some(admin);
        if self.status == ComplaintStatus::Open {
            self.status = ComplaintStatus::InProgress;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.updated_at = Utc::now();
    }
}

/// Complaint counts per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ComplaintStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub closed: usize,
}

impl ComplaintStats {
    pub fn from_complaints(complaints: &[Complaint]) -> Self {
        complaints.iter().fold(Self::default(), |mut stats, c| {
            stats.total += 1;
            match c.status {
                ComplaintStatus::Open => stats.open += 1,
                ComplaintStatus::InProgress => stats.in_progress += 1,
                ComplaintStatus::Resolved => stats.resolved += 1,
                ComplaintStatus::Closed => stats.closed += 1,
            }
            stats
        })
    }
}

/// Files complaints for customers and moves them along for admins.
pub struct ComplaintDesk {
    store: Arc<dyn ComplaintStore>,
    store_timeout: Duration,
}

/// Public API
impl ComplaintDesk {
    pub fn new(store: Arc<dyn ComplaintStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn submit(
        &self,
        user: UserId,
        complaint_type: ComplaintType,
        subject: &str,
        description: &str,
        transaction_id: Option<TxId>,
    ) -> Result<Complaint, ComplaintError> {
        let complaint = Complaint::open(user, complaint_type, subject, description, transaction_id)?;
        let result = bounded("insert", self.store_timeout, self.store.insert(complaint))
            .await
            .map_err(ComplaintError::from);
        Self::log_result("submit", &result);
        result
    }

    /// The user's complaints, newest-first.
    pub async fn list_for_user(&self, user: &UserId) -> Result<Vec<Complaint>, ComplaintError> {
        Ok(bounded("list", self.store_timeout, self.store.list_by_user(user)).await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<Complaint, ComplaintError> {
        let result = self.modify(id, |c| c.transition(update)).await;
        Self::log_result("status update", &result);
        result
    }

    pub async fn assign(&self, id: Uuid, admin: UserId) -> Result<Complaint, ComplaintError> {
        let result = self.modify(id, |c| c.assign(admin)).await;
        Self::log_result("assign", &result);
        result
    }

    pub async fn set_priority(
        &self,
        id: Uuid,
        priority: Priority,
    ) -> Result<Complaint, ComplaintError> {
        self.modify(id, |c| {
            c.set_priority(priority);
            Ok(())
        })
        .await
    }

    /// Counts over every complaint.
    pub async fn stats(&self) -> Result<ComplaintStats, ComplaintError> {
        let all = bounded("list", self.store_timeout, self.store.list_all()).await?;
        Ok(ComplaintStats::from_complaints(&all))
    }
}

/// Private API
impl ComplaintDesk {
    fn log_result(op: &str, result: &Result<Complaint, ComplaintError>) {
        match result {
            Ok(c) => info!(
                complaint = %c.id,
                user = %c.user_id,
                status = ?c.status,
                "complaint {op} applied"
            ),
            Err(e) => warn!(reason = %e, "complaint {op} rejected"),
        }
    }

    async fn modify(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut Complaint) -> Result<(), ComplaintError>,
    ) -> Result<Complaint, ComplaintError> {
        let mut complaint = bounded("get", self.store_timeout, self.store.get(id))
            .await?
            .ok_or(ComplaintError::NotFound(id))?;
        change(&mut complaint)?;
        Ok(bounded("save", self.store_timeout, self.store.save(complaint)).await?)
    }
}
