use super::agreement::BlankAgreementLetter;
use crate::domain::approval::{
    NewLoanApproval, NewLoanApprovalValidator, NewLoanApprovalValidatorProof,
};
use crate::domain::command::{
    ApproveLoan, CreateLoan, DisburseLoan, InvestLoan, LoanCommand, RejectLoan,
};
use crate::domain::disbursement::NewLoanDisbursement;
use crate::domain::investment::{Investment, NewInvestment};
use crate::domain::loan::{Loan, LoanField, LoanStatus, NewLoan};
use crate::domain::notification::EmailNotification;
use crate::domain::ports::{
    AgreementLetterGeneratorBox, LoanStoreBox, NotifierBox, UnitOfWork,
};
use crate::error::Result;
use tracing::instrument;
use uuid::Uuid;

/// Behavioural switches of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Only `PROPOSED` loans may be approved. When off, approval accepts any
    /// current status.
    pub strict_approval: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_approval: true,
        }
    }
}

/// Drives loans through `PROPOSED -> APPROVED -> INVESTED -> DISBURSED`
/// (or `PROPOSED -> REJECTED`).
///
/// Every transition that touches an existing loan runs inside one unit of
/// work holding that loan's row lock; its writes are committed together or
/// not at all.
pub struct LoanLifecycleEngine {
    store: LoanStoreBox,
    notifier: NotifierBox,
    letters: AgreementLetterGeneratorBox,
    config: EngineConfig,
}

impl LoanLifecycleEngine {
    /// Creates an engine with blank agreement letters and the default config.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence for loans and their child records.
    /// * `notifier` - Delivery of investor notifications.
    pub fn new(store: LoanStoreBox, notifier: NotifierBox) -> Self {
        Self {
            store,
            notifier,
            letters: Box::new(BlankAgreementLetter),
            config: EngineConfig::default(),
        }
    }

    pub fn with_agreement_letters(mut self, letters: AgreementLetterGeneratorBox) -> Self {
        self.letters = letters;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates a boundary command and runs the matching transition.
    pub async fn execute(&self, command: LoanCommand) -> Result<()> {
        command.validate()?;
        match command {
            LoanCommand::Create(cmd) => self.propose(cmd).await.map(|_| ()),
            LoanCommand::Approve(cmd) => self.approve(cmd).await,
            LoanCommand::Invest(cmd) => self.invest(cmd).await,
            LoanCommand::Disburse(cmd) => self.disburse(cmd).await,
            LoanCommand::Reject(cmd) => self.reject(cmd).await,
        }
    }

    /// Registers a new loan in `PROPOSED` with nothing invested.
    #[instrument(skip(self, cmd), fields(borrower = %cmd.borrower_id), err)]
    pub async fn propose(&self, cmd: CreateLoan) -> Result<Uuid> {
        let loan = self
            .store
            .create_loan(NewLoan {
                uuid: cmd.uuid.unwrap_or_else(Uuid::new_v4),
                borrower_id: cmd.borrower_id,
                principal_amount: cmd.principal_amount,
                interest_rate: cmd.interest_rate,
                roi_rate: cmd.roi_rate,
            })
            .await?;

        tracing::info!(loan = %loan.uuid, principal = %loan.principal_amount, "loan proposed");
        Ok(loan.uuid)
    }

    /// Records an approval with its validator and proofs and moves the loan to `APPROVED`.
    #[instrument(skip(self, cmd), fields(loan = %cmd.loan_uuid, employee = %cmd.employee_id), err)]
    pub async fn approve(&self, cmd: ApproveLoan) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let outcome = self.record_approval(uow.as_mut(), &cmd).await;
        settle(uow, outcome).await?;

        tracing::info!(proofs = cmd.proofs.len(), "loan approved");
        Ok(())
    }

    async fn record_approval(&self, uow: &mut dyn UnitOfWork, cmd: &ApproveLoan) -> Result<()> {
        let mut loan = uow.lock_loan(cmd.loan_uuid).await?;
        if self.config.strict_approval {
            loan.ensure_status(LoanStatus::Proposed)?;
        } else if loan.status != LoanStatus::Proposed {
            tracing::warn!(status = %loan.status, "approving a loan that is not proposed");
        }

        let approval = uow
            .create_approval(NewLoanApproval {
                loan_id: loan.id,
                approved_at: cmd.approved_at,
            })
            .await?;

        let validator = uow
            .create_validator(NewLoanApprovalValidator {
                loan_approval_id: approval.id,
                employee_id: cmd.employee_id.clone(),
            })
            .await?;

        for proof in &cmd.proofs {
            uow.create_validator_proof(NewLoanApprovalValidatorProof {
                loan_approval_validator_id: validator.id,
                proof_url: proof.proof_url.clone(),
                category: proof.category.clone(),
            })
            .await?;
        }

        loan.status = LoanStatus::Approved;
        uow.update_loan(&loan, &[LoanField::Status]).await
    }

    /// Funds an approved loan and sends every investor their agreement letter.
    ///
    /// Status and limit are checked on committed state first, then again
    /// under the row lock, so concurrent investments can never jointly exceed
    /// the principal.
    ///
    /// A `NotificationError` is returned *after* the funding has committed:
    /// callers must re-read the loan to learn whether it was funded.
    #[instrument(skip(self, cmd), fields(loan = %cmd.loan_uuid, investor = %cmd.investor_id, amount = %cmd.amount), err)]
    pub async fn invest(&self, cmd: InvestLoan) -> Result<()> {
        let loan = self.store.get_loan(cmd.loan_uuid).await?;
        loan.ensure_status(LoanStatus::Approved)?;
        loan.ensure_capacity(cmd.amount)?;

        let mut uow = self.store.begin().await?;
        let outcome = self.record_investment(uow.as_mut(), &cmd).await;
        let loan = settle(uow, outcome).await?;

        tracing::info!(
            invested = %loan.invested_amount,
            principal = %loan.principal_amount,
            status = %loan.status,
            "investment committed"
        );

        self.notify_investors(&loan).await
    }

    async fn record_investment(&self, uow: &mut dyn UnitOfWork, cmd: &InvestLoan) -> Result<Loan> {
        let mut loan = uow.lock_loan(cmd.loan_uuid).await?;
        loan.ensure_status(LoanStatus::Approved)?;
        loan.ensure_capacity(cmd.amount)?;

        loan.invested_amount += cmd.amount;
        uow.update_loan(&loan, &[LoanField::InvestedAmount]).await?;

        let mut investment = NewInvestment {
            loan_id: loan.id,
            investor_id: cmd.investor_id.clone(),
            amount: cmd.amount,
            agreement_letter_url: String::new(),
        };
        investment.agreement_letter_url = self.letters.generate(&loan, &investment).await?;
        uow.create_investment(investment).await?;

        if loan.is_fully_funded() {
            loan.transition_to(LoanStatus::Invested)?;
            uow.update_loan(&loan, &[LoanField::Status]).await?;
        }
        Ok(loan)
    }

    /// Sends the agreement letter of every investment of `loan`, stopping at the first failure.
    async fn notify_investors(&self, loan: &Loan) -> Result<()> {
        let investments = self.store.list_investments(loan.id).await?;
        for investment in &investments {
            let notification = EmailNotification::agreement_letter(investment);
            if let Err(e) = self.notifier.send(&notification).await {
                tracing::error!(investor = %investment.investor_id, error = %e, "agreement letter not delivered");
                return Err(e);
            }
        }
        tracing::debug!(sent = investments.len(), "agreement letters sent");
        Ok(())
    }

    /// Records the hand-over of funds and moves the loan to `DISBURSED`.
    #[instrument(skip(self, cmd), fields(loan = %cmd.loan_uuid, employee = %cmd.employee_id), err)]
    pub async fn disburse(&self, cmd: DisburseLoan) -> Result<()> {
        let loan = self.store.get_loan(cmd.loan_uuid).await?;
        loan.ensure_status(LoanStatus::Invested)?;

        let mut uow = self.store.begin().await?;
        let outcome = self.record_disbursement(uow.as_mut(), &cmd).await;
        settle(uow, outcome).await?;

        tracing::info!("loan disbursed");
        Ok(())
    }

    async fn record_disbursement(&self, uow: &mut dyn UnitOfWork, cmd: &DisburseLoan) -> Result<()> {
        let mut loan = uow.lock_loan(cmd.loan_uuid).await?;
        loan.ensure_status(LoanStatus::Invested)?;

        uow.create_disbursement(NewLoanDisbursement {
            loan_id: loan.id,
            field_officer_employee_id: cmd.employee_id.clone(),
            signed_agreement_letter_url: cmd.signed_agreement_letter_url.clone(),
            disbursed_at: cmd.disbursed_at,
        })
        .await?;

        loan.transition_to(LoanStatus::Disbursed)?;
        uow.update_loan(&loan, &[LoanField::Status]).await
    }

    /// Moves a proposed loan to the terminal `REJECTED` status.
    #[instrument(skip(self, cmd), fields(loan = %cmd.loan_uuid), err)]
    pub async fn reject(&self, cmd: RejectLoan) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let outcome = async {
            let mut loan = uow.lock_loan(cmd.loan_uuid).await?;
            loan.ensure_status(LoanStatus::Proposed)?;
            loan.transition_to(LoanStatus::Rejected)?;
            uow.update_loan(&loan, &[LoanField::Status]).await
        }
        .await;
        settle(uow, outcome).await?;

        tracing::info!("loan rejected");
        Ok(())
    }

    pub async fn loan(&self, uuid: Uuid) -> Result<Loan> {
        self.store.get_loan(uuid).await
    }

    /// All loans, ordered by internal id.
    pub async fn loans(&self) -> Result<Vec<Loan>> {
        self.store.list_loans().await
    }

    pub async fn investments(&self, uuid: Uuid) -> Result<Vec<Investment>> {
        let loan = self.store.get_loan(uuid).await?;
        self.store.list_investments(loan.id).await
    }
}

/// Ends a unit of work: commit on success, rollback on failure.
///
/// The operation error is returned unchanged; a failing rollback is only logged.
async fn settle<T>(uow: Box<dyn UnitOfWork>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
