#![allow(dead_code)]

use async_trait::async_trait;
use loan_engine::domain::approval::{
    LoanApproval, LoanApprovalValidator, LoanApprovalValidatorProof, NewLoanApproval,
    NewLoanApprovalValidator, NewLoanApprovalValidatorProof,
};
use loan_engine::domain::disbursement::{LoanDisbursement, NewLoanDisbursement};
use loan_engine::domain::investment::{Investment, NewInvestment};
use loan_engine::domain::loan::{Loan, LoanField, LoanId, NewLoan};
use loan_engine::domain::ports::{AgreementLetterGenerator, LoanStore, UnitOfWork};
use loan_engine::error::{LoanError, Result};
use loan_engine::infrastructure::in_memory::InMemoryLoanStore;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const APPROVED_AT: &str = "2024-03-01T10:00:00Z";
pub const DISBURSED_AT: &str = "2024-03-15T09:30:00Z";

pub fn create_line(uuid: Uuid, principal: &str) -> String {
    format!(
        r#"{{"op":"create","uuid":"{}","borrower_id":"borrower-1","principal_amount":"{}","interest_rate":"10","roi_rate":"7.5"}}"#,
        uuid, principal
    )
}

pub fn approve_line(uuid: Uuid) -> String {
    format!(
        r#"{{"op":"approve","loan_uuid":"{}","employee_id":"emp-1","proofs":[{{"proof_url":"https://proofs.example/visit.jpg","category":"field_visit"}}],"approved_at":"{}"}}"#,
        uuid, APPROVED_AT
    )
}

pub fn invest_line(uuid: Uuid, investor: &str, amount: &str) -> String {
    format!(
        r#"{{"op":"invest","loan_uuid":"{}","investor_id":"{}","amount":"{}"}}"#,
        uuid, investor, amount
    )
}

pub fn disburse_line(uuid: Uuid) -> String {
    format!(
        r#"{{"op":"disburse","loan_uuid":"{}","employee_id":"officer-1","signed_agreement_letter_url":"https://docs.example/signed.pdf","disbursed_at":"{}"}}"#,
        uuid, DISBURSED_AT
    )
}

pub fn reject_line(uuid: Uuid) -> String {
    format!(r#"{{"op":"reject","loan_uuid":"{}"}}"#, uuid)
}

/// Writes `lines` as a JSON-lines command file.
pub fn command_file<S: AsRef<str>>(lines: &[S]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line.as_ref()).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Unit-of-work operations a [`FaultInjectingStore`] can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    LockLoan,
    UpdateLoan,
    CreateApproval,
    CreateValidator,
    CreateValidatorProof,
    CreateInvestment,
    CreateDisbursement,
    Commit,
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Fail,
    Delay(Duration),
}

/// In-memory store whose units of work misbehave at one chosen operation.
#[derive(Clone)]
pub struct FaultInjectingStore {
    pub inner: InMemoryLoanStore,
    point: FaultPoint,
    fault: Fault,
}

impl FaultInjectingStore {
    pub fn new(inner: InMemoryLoanStore, point: FaultPoint, fault: Fault) -> Self {
        Self {
            inner,
            point,
            fault,
        }
    }
}

#[async_trait]
impl LoanStore for FaultInjectingStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            point: self.point,
            fault: self.fault,
        }))
    }

    async fn create_loan(&self, loan: NewLoan) -> Result<Loan> {
        self.inner.create_loan(loan).await
    }

    async fn get_loan(&self, uuid: Uuid) -> Result<Loan> {
        self.inner.get_loan(uuid).await
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        self.inner.list_loans().await
    }

    async fn list_investments(&self, loan_id: LoanId) -> Result<Vec<Investment>> {
        self.inner.list_investments(loan_id).await
    }
}

pub struct FaultyUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    point: FaultPoint,
    fault: Fault,
}

/// Applies `fault` when `point` is the armed one.
async fn intercept(armed: FaultPoint, fault: Fault, point: FaultPoint) -> Result<()> {
    if point != armed {
        return Ok(());
    }
    match fault {
        Fault::Fail => Err(LoanError::StoreError(format!(
            "injected failure at {:?}",
            point
        ))),
        Fault::Delay(delay) => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn lock_loan(&mut self, uuid: Uuid) -> Result<Loan> {
        let loan = self.inner.lock_loan(uuid).await?;
        intercept(self.point, self.fault, FaultPoint::LockLoan).await?;
        Ok(loan)
    }

    async fn update_loan(&mut self, loan: &Loan, fields: &[LoanField]) -> Result<()> {
        intercept(self.point, self.fault, FaultPoint::UpdateLoan).await?;
        self.inner.update_loan(loan, fields).await
    }

    async fn create_approval(&mut self, approval: NewLoanApproval) -> Result<LoanApproval> {
        intercept(self.point, self.fault, FaultPoint::CreateApproval).await?;
        self.inner.create_approval(approval).await
    }

    async fn create_validator(
        &mut self,
        validator: NewLoanApprovalValidator,
    ) -> Result<LoanApprovalValidator> {
        intercept(self.point, self.fault, FaultPoint::CreateValidator).await?;
        self.inner.create_validator(validator).await
    }

    async fn create_validator_proof(
        &mut self,
        proof: NewLoanApprovalValidatorProof,
    ) -> Result<LoanApprovalValidatorProof> {
        intercept(self.point, self.fault, FaultPoint::CreateValidatorProof).await?;
        self.inner.create_validator_proof(proof).await
    }

    async fn create_investment(&mut self, investment: NewInvestment) -> Result<Investment> {
        intercept(self.point, self.fault, FaultPoint::CreateInvestment).await?;
        self.inner.create_investment(investment).await
    }

    async fn create_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement> {
        intercept(self.point, self.fault, FaultPoint::CreateDisbursement).await?;
        self.inner.create_disbursement(disbursement).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        intercept(self.point, self.fault, FaultPoint::Commit).await?;
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

/// Agreement-letter generator whose backing service is down.
pub struct UnavailableLetters;

#[async_trait]
impl AgreementLetterGenerator for UnavailableLetters {
    async fn generate(&self, _loan: &Loan, _investment: &NewInvestment) -> Result<String> {
        Err(LoanError::StoreError("letter service down".to_string()))
    }
}
