use super::money::{Amount, Rate};
use crate::error::LoanError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CreateLoan {
    /// Caller-chosen identifier; generated when absent.
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub borrower_id: String,
    pub principal_amount: Amount,
    pub interest_rate: Rate,
    pub roi_rate: Rate,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Proof {
    pub proof_url: String,
    pub category: String,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ApproveLoan {
    pub loan_uuid: Uuid,
    pub employee_id: String,
    pub proofs: Vec<Proof>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InvestLoan {
    pub loan_uuid: Uuid,
    pub investor_id: String,
    pub amount: Amount,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct DisburseLoan {
    pub loan_uuid: Uuid,
    pub employee_id: String,
    pub signed_agreement_letter_url: String,
    pub disbursed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RejectLoan {
    pub loan_uuid: Uuid,
}

/// A lifecycle request as it arrives at the boundary.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum LoanCommand {
    Create(CreateLoan),
    Approve(ApproveLoan),
    Invest(InvestLoan),
    Disburse(DisburseLoan),
    Reject(RejectLoan),
}

impl LoanCommand {
    /// Boundary checks the engine relies on but does not repeat.
    ///
    /// Positivity of amounts and rates is already guaranteed by their types.
    pub fn validate(&self) -> Result<(), LoanError> {
        match self {
            LoanCommand::Create(cmd) => require("borrower_id", &cmd.borrower_id),
            LoanCommand::Approve(cmd) => {
                require("employee_id", &cmd.employee_id)?;
                if cmd.proofs.is_empty() {
                    return Err(LoanError::ValidationError(
                        "at least one proof is required".to_string(),
                    ));
                }
                for proof in &cmd.proofs {
                    require("proof_url", &proof.proof_url)?;
                    require("category", &proof.category)?;
                }
                Ok(())
            }
            LoanCommand::Invest(cmd) => require("investor_id", &cmd.investor_id),
            LoanCommand::Disburse(cmd) => {
                require("employee_id", &cmd.employee_id)?;
                require(
                    "signed_agreement_letter_url",
                    &cmd.signed_agreement_letter_url,
                )
            }
            LoanCommand::Reject(_) => Ok(()),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), LoanError> {
    if value.trim().is_empty() {
        Err(LoanError::ValidationError(format!("{} is required", field)))
    } else {
        Ok(())
    }
}
