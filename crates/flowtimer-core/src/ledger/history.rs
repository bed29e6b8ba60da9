//! In-memory session history.

use tracing::warn;

use super::{is_valid_id, new_id, Session, SessionDraft, SessionLedger};
use crate::error::LedgerError;

/// Sessions known to this process, in insertion order.
///
/// Seeded from the ledger on load and then updated optimistically: a new
/// session is visible here before (and regardless of whether) the store
/// accepted it.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    sessions: Vec<Session>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored records, dropping any with malformed identifiers.
    pub fn seed(sessions: Vec<Session>) -> Self {
        let sessions = sessions
            .into_iter()
            .filter(|s| {
                let ok = is_valid_id(&s.id)
                    && s.task_id.as_deref().map_or(true, is_valid_id);
                if !ok {
                    warn!(session_id = %s.id, task_id = ?s.task_id, "dropping session with malformed identifier");
                }
                ok
            })
            .collect();
        Self { sessions }
    }

    pub fn load(ledger: &dyn SessionLedger) -> Result<Self, LedgerError> {
        Ok(Self::seed(ledger.list()?))
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Insert a draft under a provisional id and return that id.
    pub fn record_optimistic(&mut self, draft: SessionDraft) -> String {
        let id = new_id();
        self.sessions.push(Session::from_draft(id.clone(), draft));
        id
    }

    /// Swap a provisional record for the store's canonical one.
    pub fn reconcile(&mut self, provisional_id: &str, canonical: Session) {
        match self.sessions.iter_mut().find(|s| s.id == provisional_id) {
            Some(slot) => *slot = canonical,
            None => self.sessions.push(canonical),
        }
    }

    /// Returns false when the session is unknown.
    pub fn set_task(&mut self, id: &str, task_id: Option<String>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(session) => {
                session.task_id = task_id;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(index))
    }
}
