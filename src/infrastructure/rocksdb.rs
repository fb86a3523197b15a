use super::row_lock::{RowGuard, RowLocks};
use crate::domain::approval::{
    LoanApproval, LoanApprovalValidator, LoanApprovalValidatorProof, NewLoanApproval,
    NewLoanApprovalValidator, NewLoanApprovalValidatorProof,
};
use crate::domain::disbursement::{LoanDisbursement, NewLoanDisbursement};
use crate::domain::investment::{Investment, NewInvestment};
use crate::domain::loan::{Loan, LoanField, LoanId, NewLoan};
use crate::domain::ports::{LoanStore, UnitOfWork};
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Loans keyed by internal id.
pub const CF_LOANS: &str = "loans";
/// UUID to internal id index.
pub const CF_LOAN_UUIDS: &str = "loan_uuids";
pub const CF_APPROVALS: &str = "approvals";
pub const CF_VALIDATORS: &str = "validators";
pub const CF_PROOFS: &str = "proofs";
/// Investments keyed by `loan_id ++ investment_id` for per-loan scans.
pub const CF_INVESTMENTS: &str = "investments";
/// Disbursements keyed by loan id, which makes them unique per loan.
pub const CF_DISBURSEMENTS: &str = "disbursements";
pub const CF_META: &str = "meta";

const SEQUENCE_KEY: &[u8] = b"sequence";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_LOANS,
    CF_LOAN_UUIDS,
    CF_APPROVALS,
    CF_VALIDATORS,
    CF_PROOFS,
    CF_INVESTMENTS,
    CF_DISBURSEMENTS,
    CF_META,
];

/// A persistent loan store backed by RocksDB.
///
/// Each record kind lives in its own column family. A unit of work collects
/// its puts and writes them as one `WriteBatch` on commit, so a commit is
/// all-or-nothing even across column families.
///
/// `Clone` shares the underlying `Arc<DB>`, row locks and id sequence.
#[derive(Clone)]
pub struct RocksDbLoanStore {
    db: Arc<DB>,
    sequence: Arc<AtomicU64>,
    locks: RowLocks,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDbLoanStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let sequence = {
            let meta = db
                .cf_handle(CF_META)
                .ok_or_else(|| missing_cf(CF_META))?;
            match db.get_cf(meta, SEQUENCE_KEY)? {
                Some(bytes) => decode_u64(&bytes)?,
                None => 0,
            }
        };
        tracing::debug!(sequence, "opened rocksdb loan store");

        Ok(Self {
            db: Arc::new(db),
            sequence: Arc::new(AtomicU64::new(sequence)),
            locks: RowLocks::new(),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| missing_cf(name))
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn loan_by_id(&self, id: LoanId) -> Result<Option<Loan>> {
        self.read(CF_LOANS, &id.to_be_bytes())
    }

    fn loan_id(&self, uuid: Uuid) -> Result<Option<LoanId>> {
        match self.db.get_cf(self.cf(CF_LOAN_UUIDS)?, uuid.as_bytes())? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes `ops` atomically together with the current id sequence.
    ///
    /// `check` runs under the commit lock, right before the write.
    fn write_batch<F>(&self, ops: Vec<Put>, check: F) -> Result<()>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let _commit = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        check(self)?;

        let mut batch = WriteBatch::default();
        for put in &ops {
            batch.put_cf(self.cf(put.cf)?, &put.key, &put.value);
        }
        batch.put_cf(
            self.cf(CF_META)?,
            SEQUENCE_KEY,
            self.sequence.load(Ordering::SeqCst).to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl LoanStore for RocksDbLoanStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(RocksDbUnitOfWork {
            store: self.clone(),
            puts: Vec::new(),
            loans: HashMap::new(),
            disbursed: Vec::new(),
            guards: HashMap::new(),
            finished: false,
        }))
    }

    async fn create_loan(&self, loan: NewLoan) -> Result<Loan> {
        let loan = loan.into_loan(self.next_id(), Utc::now());
        let ops = vec![
            Put::record(CF_LOANS, loan.id.to_be_bytes().to_vec(), &loan)?,
            Put {
                cf: CF_LOAN_UUIDS,
                key: loan.uuid.as_bytes().to_vec(),
                value: loan.id.to_be_bytes().to_vec(),
            },
        ];

        self.write_batch(ops, |store| match store.loan_id(loan.uuid)? {
            Some(_) => Err(LoanError::StoreError(format!(
                "loan {} already exists",
                loan.uuid
            ))),
            None => Ok(()),
        })?;
        Ok(loan)
    }

    async fn get_loan(&self, uuid: Uuid) -> Result<Loan> {
        self.loan_id(uuid)?
            .map(|id| self.loan_by_id(id))
            .transpose()?
            .flatten()
            .ok_or_else(|| LoanError::NotFound(format!("loan {}", uuid)))
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        let mut loans = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_LOANS)?, IteratorMode::Start) {
            let (_key, value) = item?;
            loans.push(decode(&value)?);
        }
        Ok(loans)
    }

    async fn list_investments(&self, loan_id: LoanId) -> Result<Vec<Investment>> {
        let prefix = loan_id.to_be_bytes();
        let mut investments = Vec::new();
        let iter = self.db.iterator_cf(
            self.cf(CF_INVESTMENTS)?,
            IteratorMode::From(&prefix, Direction::Forward),
        );
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            investments.push(decode(&value)?);
        }
        Ok(investments)
    }
}

struct Put {
    cf: &'static str,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Put {
    fn record<T: Serialize>(cf: &'static str, key: Vec<u8>, value: &T) -> Result<Self> {
        Ok(Self {
            cf,
            key,
            value: encode(value)?,
        })
    }
}

pub struct RocksDbUnitOfWork {
    store: RocksDbLoanStore,
    puts: Vec<Put>,
    /// Working copies of loans updated in this unit.
    loans: HashMap<LoanId, Loan>,
    disbursed: Vec<LoanId>,
    guards: HashMap<LoanId, RowGuard>,
    finished: bool,
}

#[async_trait]
impl UnitOfWork for RocksDbUnitOfWork {
    async fn lock_loan(&mut self, uuid: Uuid) -> Result<Loan> {
        let loan = self.store.get_loan(uuid).await?;
        if !self.guards.contains_key(&loan.id) {
            let guard = self.store.locks.acquire(loan.id).await;
            self.guards.insert(loan.id, guard);
        }
        self.store.get_loan(uuid).await
    }

    async fn update_loan(&mut self, loan: &Loan, fields: &[LoanField]) -> Result<()> {
        let mut working = match self.loans.remove(&loan.id) {
            Some(working) => working,
            None => self
                .store
                .loan_by_id(loan.id)?
                .ok_or_else(|| LoanError::StoreError(format!("loan {} does not exist", loan.id)))?,
        };
        working.apply_fields(loan, fields);
        if working.invested_amount > working.principal_amount {
            return Err(LoanError::StoreError(format!(
                "invested amount of loan {} exceeds principal",
                loan.id
            )));
        }
        self.loans.insert(loan.id, working);
        Ok(())
    }

    async fn create_approval(&mut self, approval: NewLoanApproval) -> Result<LoanApproval> {
        let approval = LoanApproval {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_id: approval.loan_id,
            approved_at: approval.approved_at,
        };
        self.puts.push(Put::record(
            CF_APPROVALS,
            approval.id.to_be_bytes().to_vec(),
            &approval,
        )?);
        Ok(approval)
    }

    async fn create_validator(
        &mut self,
        validator: NewLoanApprovalValidator,
    ) -> Result<LoanApprovalValidator> {
        let validator = LoanApprovalValidator {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_approval_id: validator.loan_approval_id,
            employee_id: validator.employee_id,
        };
        self.puts.push(Put::record(
            CF_VALIDATORS,
            validator.id.to_be_bytes().to_vec(),
            &validator,
        )?);
        Ok(validator)
    }

    async fn create_validator_proof(
        &mut self,
        proof: NewLoanApprovalValidatorProof,
    ) -> Result<LoanApprovalValidatorProof> {
        let proof = LoanApprovalValidatorProof {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_approval_validator_id: proof.loan_approval_validator_id,
            proof_url: proof.proof_url,
            category: proof.category,
        };
        self.puts.push(Put::record(
            CF_PROOFS,
            proof.id.to_be_bytes().to_vec(),
            &proof,
        )?);
        Ok(proof)
    }

    async fn create_investment(&mut self, investment: NewInvestment) -> Result<Investment> {
        let investment = Investment {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_id: investment.loan_id,
            investor_id: investment.investor_id,
            amount: investment.amount,
            agreement_letter_url: investment.agreement_letter_url,
        };
        let mut key = investment.loan_id.to_be_bytes().to_vec();
        key.extend_from_slice(&investment.id.to_be_bytes());
        self.puts
            .push(Put::record(CF_INVESTMENTS, key, &investment)?);
        Ok(investment)
    }

    async fn create_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement> {
        if self.disbursed.contains(&disbursement.loan_id) {
            return Err(LoanError::StoreError(format!(
                "loan {} is already disbursed",
                disbursement.loan_id
            )));
        }
        let disbursement = LoanDisbursement {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_id: disbursement.loan_id,
            field_officer_employee_id: disbursement.field_officer_employee_id,
            signed_agreement_letter_url: disbursement.signed_agreement_letter_url,
            disbursed_at: disbursement.disbursed_at,
        };
        self.puts.push(Put::record(
            CF_DISBURSEMENTS,
            disbursement.loan_id.to_be_bytes().to_vec(),
            &disbursement,
        )?);
        self.disbursed.push(disbursement.loan_id);
        Ok(disbursement)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        let now = Utc::now();

        let mut puts = std::mem::take(&mut self.puts);
        for (id, mut loan) in std::mem::take(&mut self.loans) {
            loan.updated_at = now;
            puts.push(Put::record(CF_LOANS, id.to_be_bytes().to_vec(), &loan)?);
        }

        let disbursed = std::mem::take(&mut self.disbursed);
        self.store.write_batch(puts, |store| {
            let cf = store.cf(CF_DISBURSEMENTS)?;
            for loan_id in &disbursed {
                if store.db.get_cf(cf, loan_id.to_be_bytes())?.is_some() {
                    return Err(LoanError::StoreError(format!(
                        "loan {} is already disbursed",
                        loan_id
                    )));
                }
            }
            Ok(())
        })
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.puts.clear();
        self.loans.clear();
        Ok(())
    }
}

impl Drop for RocksDbUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                discarded_writes = self.puts.len() + self.loans.len(),
                "unit of work dropped before commit, rolling back"
            );
        }
    }
}

fn missing_cf(name: &str) -> LoanError {
    LoanError::StoreError(format!("{} column family not found", name))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| LoanError::StoreError(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| LoanError::StoreError(format!("Deserialization error: {}", e)))
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LoanError::StoreError("corrupt integer value".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}
