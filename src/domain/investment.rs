use super::loan::LoanId;
use super::money::Amount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single funding contribution against a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: u64,
    pub uuid: Uuid,
    pub loan_id: LoanId,
    pub investor_id: String,
    pub amount: Amount,
    pub agreement_letter_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvestment {
    pub loan_id: LoanId,
    pub investor_id: String,
    pub amount: Amount,
    pub agreement_letter_url: String,
}
