//! AuditLog - read-only projection for dispute resolution.
//!
//! Merges the account's ledger entries and consumption events into one lazy,
//! timestamp-ordered stream. Decode failures surface as errors, never as a
//! silently truncated history.

use std::iter::Peekable;
use std::sync::Arc;

use crate::models::account::AccountId;
use crate::models::allowance::ConsumptionEvent;
use crate::models::errors::LedgerError;
use crate::models::ledger_entry::LedgerEntry;
use crate::store::LedgerDb;

#[derive(Debug, Clone)]
pub enum AuditEvent {
    Ledger(LedgerEntry),
    Consumption(ConsumptionEvent),
}

impl AuditEvent {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::Ledger(e) => e.timestamp_ms,
            Self::Consumption(e) => e.timestamp_ms,
        }
    }
}

pub struct AuditLog {
    db: Arc<LedgerDb>,
}

impl AuditLog {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }

    /// Events in [from_ms, to_ms), oldest first. Restartable: every call
    /// builds a fresh iterator over the same window.
    pub fn history(
        &self,
        account_id: AccountId,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<HistoryIter, LedgerError> {
        if from_ms > to_ms {
            return Err(LedgerError::InvalidInput(format!(
                "invalid history window: {} > {}",
                from_ms, to_ms
            )));
        }
        let entries: Box<DynEventIter<LedgerEntry>> =
            Box::new(self.db.entries_in_window(account_id, from_ms, to_ms));
        let events: Box<DynEventIter<ConsumptionEvent>> =
            Box::new(self.db.consumption_in_window(account_id, from_ms, to_ms));
        Ok(HistoryIter { entries: entries.peekable(), events: events.peekable() })
    }
}

type DynEventIter<T> = dyn Iterator<Item = Result<T, LedgerError>>;

pub struct HistoryIter {
    entries: Peekable<Box<DynEventIter<LedgerEntry>>>,
    events: Peekable<Box<DynEventIter<ConsumptionEvent>>>,
}

impl Iterator for HistoryIter {
    type Item = Result<AuditEvent, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Errors pop immediately; otherwise take the older head, ledger
        // entries first on a timestamp tie.
        let entry_ts = match self.entries.peek() {
            Some(Err(_)) => {
                return self.entries.next().map(|r| r.map(AuditEvent::Ledger));
            }
            Some(Ok(e)) => Some(e.timestamp_ms),
            None => None,
        };
        let event_ts = match self.events.peek() {
            Some(Err(_)) => {
                return self.events.next().map(|r| r.map(AuditEvent::Consumption));
            }
            Some(Ok(e)) => Some(e.timestamp_ms),
            None => None,
        };

        match (entry_ts, event_ts) {
            (None, None) => None,
            (Some(_), None) => self.entries.next().map(|r| r.map(AuditEvent::Ledger)),
            (None, Some(_)) => self.events.next().map(|r| r.map(AuditEvent::Consumption)),
            (Some(a), Some(b)) => {
                if a <= b {
                    self.entries.next().map(|r| r.map(AuditEvent::Ledger))
                } else {
                    self.events.next().map(|r| r.map(AuditEvent::Consumption))
                }
            }
        }
    }
}
