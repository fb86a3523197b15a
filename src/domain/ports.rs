use super::approval::{
    LoanApproval, LoanApprovalValidator, LoanApprovalValidatorProof, NewLoanApproval,
    NewLoanApprovalValidator, NewLoanApprovalValidatorProof,
};
use super::disbursement::{LoanDisbursement, NewLoanDisbursement};
use super::investment::{Investment, NewInvestment};
use super::loan::{Loan, LoanField, LoanId, NewLoan};
use super::notification::EmailNotification;
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence of loans and their child records.
///
/// Reads on the store itself see committed state only. Every mutation of an
/// existing loan goes through a [`UnitOfWork`] obtained from [`LoanStore::begin`].
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
    /// Single-write creation; fails with `StoreError` if the UUID is taken.
    async fn create_loan(&self, loan: NewLoan) -> Result<Loan>;
    /// Fails with `NotFound` when no loan carries `uuid`.
    async fn get_loan(&self, uuid: Uuid) -> Result<Loan>;
    async fn list_loans(&self) -> Result<Vec<Loan>>;
    async fn list_investments(&self, loan_id: LoanId) -> Result<Vec<Investment>>;
}

/// An atomic group of writes.
///
/// Writes are buffered and become visible only when [`commit`](Self::commit)
/// succeeds. `commit` and `rollback` consume the unit, so exactly one of them
/// can run; dropping the unit without either discards the buffered writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads the committed loan and holds its row lock until the unit ends.
    async fn lock_loan(&mut self, uuid: Uuid) -> Result<Loan>;
    /// Persists only `fields` from `loan`.
    async fn update_loan(&mut self, loan: &Loan, fields: &[LoanField]) -> Result<()>;
    async fn create_approval(&mut self, approval: NewLoanApproval) -> Result<LoanApproval>;
    async fn create_validator(
        &mut self,
        validator: NewLoanApprovalValidator,
    ) -> Result<LoanApprovalValidator>;
    async fn create_validator_proof(
        &mut self,
        proof: NewLoanApprovalValidatorProof,
    ) -> Result<LoanApprovalValidatorProof>;
    async fn create_investment(&mut self, investment: NewInvestment) -> Result<Investment>;
    async fn create_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &EmailNotification) -> Result<()>;
}

/// Produces the agreement-letter reference stored on an investment.
#[async_trait]
pub trait AgreementLetterGenerator: Send + Sync {
    async fn generate(&self, loan: &Loan, investment: &NewInvestment) -> Result<String>;
}

pub type LoanStoreBox = Box<dyn LoanStore>;
pub type NotifierBox = Box<dyn Notifier>;
pub type AgreementLetterGeneratorBox = Box<dyn AgreementLetterGenerator>;
