use super::loan::LoanId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One approval event of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApproval {
    pub id: u64,
    pub uuid: Uuid,
    pub loan_id: LoanId,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanApproval {
    pub loan_id: LoanId,
    pub approved_at: DateTime<Utc>,
}

/// The employee who signed off an approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApprovalValidator {
    pub id: u64,
    pub uuid: Uuid,
    pub loan_approval_id: u64,
    pub employee_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanApprovalValidator {
    pub loan_approval_id: u64,
    pub employee_id: String,
}

/// Supporting document attached by a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApprovalValidatorProof {
    pub id: u64,
    pub uuid: Uuid,
    pub loan_approval_validator_id: u64,
    pub proof_url: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanApprovalValidatorProof {
    pub loan_approval_validator_id: u64,
    pub proof_url: String,
    pub category: String,
}
