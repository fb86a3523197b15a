use super::loan::LoanId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hand-over of the funds to the borrower. At most one per loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDisbursement {
    pub id: u64,
    pub uuid: Uuid,
    pub loan_id: LoanId,
    pub field_officer_employee_id: String,
    pub signed_agreement_letter_url: String,
    pub disbursed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanDisbursement {
    pub loan_id: LoanId,
    pub field_officer_employee_id: String,
    pub signed_agreement_letter_url: String,
    pub disbursed_at: DateTime<Utc>,
}
