use super::row_lock::{RowGuard, RowLocks};
use crate::domain::approval::{
    LoanApproval, LoanApprovalValidator, LoanApprovalValidatorProof, NewLoanApproval,
    NewLoanApprovalValidator, NewLoanApprovalValidatorProof,
};
use crate::domain::disbursement::{LoanDisbursement, NewLoanDisbursement};
use crate::domain::investment::{Investment, NewInvestment};
use crate::domain::loan::{Loan, LoanField, LoanId, NewLoan};
use crate::domain::notification::EmailNotification;
use crate::domain::ports::{LoanStore, Notifier, UnitOfWork};
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    loans: BTreeMap<LoanId, Loan>,
    loan_ids: HashMap<Uuid, LoanId>,
    approvals: Vec<LoanApproval>,
    validators: Vec<LoanApprovalValidator>,
    proofs: Vec<LoanApprovalValidatorProof>,
    investments: Vec<Investment>,
    disbursements: Vec<LoanDisbursement>,
}

enum PendingWrite {
    UpdateLoan { loan: Loan, fields: Vec<LoanField> },
    Approval(LoanApproval),
    Validator(LoanApprovalValidator),
    Proof(LoanApprovalValidatorProof),
    Investment(Investment),
    Disbursement(LoanDisbursement),
}

impl Tables {
    /// Constraint checks for a whole batch, run before anything is applied.
    fn check(&self, pending: &[PendingWrite]) -> Result<()> {
        let mut disbursed: HashSet<LoanId> =
            self.disbursements.iter().map(|d| d.loan_id).collect();

        for write in pending {
            match write {
                PendingWrite::UpdateLoan { loan, .. } => {
                    if !self.loans.contains_key(&loan.id) {
                        return Err(LoanError::StoreError(format!(
                            "loan {} does not exist",
                            loan.id
                        )));
                    }
                    if loan.invested_amount > loan.principal_amount {
                        return Err(LoanError::StoreError(format!(
                            "invested amount of loan {} exceeds principal",
                            loan.id
                        )));
                    }
                }
                PendingWrite::Disbursement(disbursement) => {
                    if !disbursed.insert(disbursement.loan_id) {
                        return Err(LoanError::StoreError(format!(
                            "loan {} is already disbursed",
                            disbursement.loan_id
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: PendingWrite) {
        match write {
            PendingWrite::UpdateLoan { loan, fields } => {
                if let Some(stored) = self.loans.get_mut(&loan.id) {
                    stored.apply_fields(&loan, &fields);
                    stored.updated_at = Utc::now();
                }
            }
            PendingWrite::Approval(approval) => self.approvals.push(approval),
            PendingWrite::Validator(validator) => self.validators.push(validator),
            PendingWrite::Proof(proof) => self.proofs.push(proof),
            PendingWrite::Investment(investment) => self.investments.push(investment),
            PendingWrite::Disbursement(disbursement) => self.disbursements.push(disbursement),
        }
    }
}

/// A thread-safe in-memory loan store.
///
/// Cloning shares the same tables, locks and id sequence. Suitable for tests
/// and for runs that do not need persistence.
#[derive(Default, Clone)]
pub struct InMemoryLoanStore {
    tables: Arc<RwLock<Tables>>,
    sequence: Arc<AtomicU64>,
    locks: RowLocks,
}

impl InMemoryLoanStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn approvals(&self) -> Vec<LoanApproval> {
        self.tables.read().await.approvals.clone()
    }

    pub async fn validators(&self) -> Vec<LoanApprovalValidator> {
        self.tables.read().await.validators.clone()
    }

    pub async fn proofs(&self) -> Vec<LoanApprovalValidatorProof> {
        self.tables.read().await.proofs.clone()
    }

    pub async fn disbursements(&self) -> Vec<LoanDisbursement> {
        self.tables.read().await.disbursements.clone()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.clone(),
            pending: Vec::new(),
            guards: HashMap::new(),
            finished: false,
        }))
    }

    async fn create_loan(&self, loan: NewLoan) -> Result<Loan> {
        let mut tables = self.tables.write().await;
        if tables.loan_ids.contains_key(&loan.uuid) {
            return Err(LoanError::StoreError(format!(
                "loan {} already exists",
                loan.uuid
            )));
        }

        let loan = loan.into_loan(self.next_id(), Utc::now());
        tables.loan_ids.insert(loan.uuid, loan.id);
        tables.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn get_loan(&self, uuid: Uuid) -> Result<Loan> {
        let tables = self.tables.read().await;
        tables
            .loan_ids
            .get(&uuid)
            .and_then(|id| tables.loans.get(id))
            .cloned()
            .ok_or_else(|| LoanError::NotFound(format!("loan {}", uuid)))
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.values().cloned().collect())
    }

    async fn list_investments(&self, loan_id: LoanId) -> Result<Vec<Investment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .investments
            .iter()
            .filter(|investment| investment.loan_id == loan_id)
            .cloned()
            .collect())
    }
}

/// Buffers writes until commit and holds the row locks it acquired.
pub struct InMemoryUnitOfWork {
    store: InMemoryLoanStore,
    pending: Vec<PendingWrite>,
    guards: HashMap<LoanId, RowGuard>,
    finished: bool,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_loan(&mut self, uuid: Uuid) -> Result<Loan> {
        let loan = self.store.get_loan(uuid).await?;
        if !self.guards.contains_key(&loan.id) {
            let guard = self.store.locks.acquire(loan.id).await;
            self.guards.insert(loan.id, guard);
        }
        // Re-read: the committed row may have moved while we waited.
        self.store.get_loan(uuid).await
    }

    async fn update_loan(&mut self, loan: &Loan, fields: &[LoanField]) -> Result<()> {
        self.pending.push(PendingWrite::UpdateLoan {
            loan: loan.clone(),
            fields: fields.to_vec(),
        });
        Ok(())
    }

    async fn create_approval(&mut self, approval: NewLoanApproval) -> Result<LoanApproval> {
        let approval = LoanApproval {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_id: approval.loan_id,
            approved_at: approval.approved_at,
        };
        self.pending.push(PendingWrite::Approval(approval.clone()));
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
        self.pending.push(PendingWrite::Validator(validator.clone()));
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
        self.pending.push(PendingWrite::Proof(proof.clone()));
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
        self.pending
            .push(PendingWrite::Investment(investment.clone()));
        Ok(investment)
    }

    async fn create_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement> {
        let disbursement = LoanDisbursement {
            id: self.store.next_id(),
            uuid: Uuid::new_v4(),
            loan_id: disbursement.loan_id,
            field_officer_employee_id: disbursement.field_officer_employee_id,
            signed_agreement_letter_url: disbursement.signed_agreement_letter_url,
            disbursed_at: disbursement.disbursed_at,
        };
        self.pending
            .push(PendingWrite::Disbursement(disbursement.clone()));
        Ok(disbursement)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        let pending = std::mem::take(&mut self.pending);

        let mut tables = self.store.tables.write().await;
        tables.check(&pending)?;
        for write in pending {
            tables.apply(write);
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.pending.clear();
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                discarded_writes = self.pending.len(),
                "unit of work dropped before commit, rolling back"
            );
        }
    }
}

/// Notifier that keeps every message in memory.
///
/// A notifier built with [`InMemoryNotifier::failing`] rejects every send,
/// which is how tests exercise the post-commit failure path.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<EmailNotification>>>,
    failure: Option<String>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(reason.into()),
        }
    }

    pub async fn sent(&self) -> Vec<EmailNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: &EmailNotification) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(LoanError::NotificationError(reason.clone()));
        }
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}
