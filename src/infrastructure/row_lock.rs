use crate::domain::loan::LoanId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type RowTable = Arc<Mutex<HashMap<LoanId, Arc<AsyncMutex<()>>>>>;

/// Exclusive per-loan locks, the in-process stand-in for `SELECT ... FOR UPDATE`.
///
/// Guards are owned so a unit of work can hold them across `.await` points and
/// release them simply by being dropped. A row's entry lives only while some
/// guard or waiter references it.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: RowTable,
}

/// Held row lock. Field order matters: the mutex is released before the
/// entry is reclaimed.
pub struct RowGuard {
    _guard: OwnedMutexGuard<()>,
    _entry: RowEntry,
}

struct RowEntry {
    loan_id: LoanId,
    rows: RowTable,
}

impl Drop for RowEntry {
    fn drop(&mut self) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        // The table's own reference is the last one: nobody holds or awaits the row.
        if rows
            .get(&self.loan_id)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            rows.remove(&self.loan_id);
        }
    }
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, loan_id: LoanId) -> RowGuard {
        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
            rows.entry(loan_id).or_default().clone()
        };
        let entry = RowEntry {
            loan_id,
            rows: self.rows.clone(),
        };
        let guard = row.lock_owned().await;
        RowGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
