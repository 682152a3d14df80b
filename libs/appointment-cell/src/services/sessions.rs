// libs/appointment-cell/src/services/sessions.rs
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentError, EntityKind, PatientRef};
use crate::services::wizard::BookingWizard;

/// One wizard driven over HTTP, owned by the user who opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardSession {
    pub id: Uuid,
    pub owner_id: String,
    /// Who the appointment will be booked for.
    pub patient: PatientRef,
    pub wizard: BookingWizard,
    pub opened_at: DateTime<Utc>,
}

/// Open wizards keyed by session id. Sessions older than `ttl` are evicted
/// whenever a new one is opened.
#[derive(Debug)]
pub struct WizardSessions {
    sessions: RwLock<HashMap<Uuid, WizardSession>>,
    ttl: Duration,
}

impl WizardSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(
        &self,
        owner_id: &str,
        patient: PatientRef,
        wizard: BookingWizard,
        now: DateTime<Utc>,
    ) -> WizardSession {
        let session = WizardSession {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            patient,
            wizard,
            opened_at: now,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.opened_at + self.ttl > now);
        if sessions.len() < before {
            debug!("Evicted {} expired wizard sessions", before - sessions.len());
        }

        debug!("Wizard session {} opened by {}", session.id, owner_id);
        sessions.insert(session.id, session.clone());
        session
    }

    /// Sessions owned by someone else are reported as missing.
    pub async fn get(&self, session_id: Uuid, owner_id: &str) -> Result<WizardSession, AppointmentError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| AppointmentError::not_found(EntityKind::WizardSession, session_id.to_string()))
    }

    /// Stores the wizard state back after an operation.
    pub async fn save(&self, session_id: Uuid, owner_id: &str, wizard: BookingWizard) -> Result<WizardSession, AppointmentError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .filter(|s| s.owner_id == owner_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::WizardSession, session_id.to_string()))?;

        session.wizard = wizard;
        Ok(session.clone())
    }

    pub async fn remove(&self, session_id: Uuid, owner_id: &str) -> Result<WizardSession, AppointmentError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            Some(s) if s.owner_id == owner_id => {
                debug!("Wizard session {} removed", session_id);
                sessions
                    .remove(&session_id)
                    .ok_or_else(|| AppointmentError::not_found(EntityKind::WizardSession, session_id.to_string()))
            }
            _ => Err(AppointmentError::not_found(EntityKind::WizardSession, session_id.to_string())),
        }
    }

    #[cfg(test)]
    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
