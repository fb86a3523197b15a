use super::money::{Amount, Balance, Rate};
use crate::error::LoanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Internal key assigned by the store.
pub type LoanId = u64;

/// Lifecycle status of a loan.
///
/// Discriminants are the stable numeric codes persisted by stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Proposed = 1,
    Approved = 2,
    Rejected = 3,
    Invested = 4,
    Disbursed = 5,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 5] = [
        LoanStatus::Proposed,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::Invested,
        LoanStatus::Disbursed,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Proposed => "PROPOSED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Invested => "INVESTED",
            LoanStatus::Disbursed => "DISBURSED",
        }
    }

    /// Edges of the lifecycle graph. A partial investment keeps the loan in
    /// `Approved`, hence the self-edge.
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Proposed, LoanStatus::Approved)
                | (LoanStatus::Proposed, LoanStatus::Rejected)
                | (LoanStatus::Approved, LoanStatus::Approved)
                | (LoanStatus::Approved, LoanStatus::Invested)
                | (LoanStatus::Invested, LoanStatus::Disbursed)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LoanError::ValidationError(format!("unknown loan status '{}'", s)))
    }
}

/// Columns of a loan that a unit of work may update in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanField {
    Status,
    InvestedAmount,
}

/// A loan as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub uuid: Uuid,
    pub borrower_id: String,
    pub principal_amount: Amount,
    pub interest_rate: Rate,
    pub roi_rate: Rate,
    pub invested_amount: Balance,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Fails with `InvalidState` unless the loan is exactly in `expected`.
    pub fn ensure_status(&self, expected: LoanStatus) -> Result<(), LoanError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(LoanError::InvalidState(format!(
                "loan is not {}",
                expected.as_str().to_lowercase()
            )))
        }
    }

    /// Checks that `amount` still fits under the principal.
    pub fn ensure_capacity(&self, amount: Amount) -> Result<(), LoanError> {
        match self.invested_amount.value().checked_add(amount.value()) {
            Some(total) if total <= self.principal_amount.value() => Ok(()),
            _ => Err(LoanError::LimitExceeded(
                "loan investment amount is greater than principal amount".to_string(),
            )),
        }
    }

    pub fn is_fully_funded(&self) -> bool {
        self.invested_amount == self.principal_amount
    }

    pub fn transition_to(&mut self, next: LoanStatus) -> Result<(), LoanError> {
        if !self.status.can_transition_to(next) {
            return Err(LoanError::InvalidState(format!(
                "loan cannot move from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Copies the named columns from `source`, leaving every other column untouched.
    pub fn apply_fields(&mut self, source: &Loan, fields: &[LoanField]) {
        for field in fields {
            match field {
                LoanField::Status => self.status = source.status,
                LoanField::InvestedAmount => self.invested_amount = source.invested_amount,
            }
        }
    }
}

/// Loan as submitted for creation; the store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub uuid: Uuid,
    pub borrower_id: String,
    pub principal_amount: Amount,
    pub interest_rate: Rate,
    pub roi_rate: Rate,
}

impl NewLoan {
    pub fn into_loan(self, id: LoanId, now: DateTime<Utc>) -> Loan {
        Loan {
            id,
            uuid: self.uuid,
            borrower_id: self.borrower_id,
            principal_amount: self.principal_amount,
            interest_rate: self.interest_rate,
            roi_rate: self.roi_rate,
            invested_amount: Balance::ZERO,
            status: LoanStatus::Proposed,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn loan(principal: rust_decimal::Decimal, invested: rust_decimal::Decimal) -> Loan {
        let mut loan = NewLoan {
            uuid: Uuid::new_v4(),
            borrower_id: "borrower-1".to_string(),
            principal_amount: Amount::new(principal).unwrap(),
            interest_rate: Rate::new(dec!(5)).unwrap(),
            roi_rate: Rate::new(dec!(3)).unwrap(),
        }
        .into_loan(1, Utc::now());
        loan.invested_amount = Balance::new(invested);
        loan
    }

    #[test]
    fn test_status_codes_round_trip() {
        for status in LoanStatus::ALL {
            assert_eq!(LoanStatus::from_code(status.code()), Some(status));
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), status);
        }
        assert_eq!(LoanStatus::Proposed.code(), 1);
        assert_eq!(LoanStatus::Disbursed.code(), 5);
        assert_eq!(LoanStatus::from_code(9), None);
    }

    #[test]
    fn test_unknown_status_name_is_rejected() {
        assert!("FUNDED".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn test_transition_graph_is_forward_only() {
        use LoanStatus::*;
        assert!(Proposed.can_transition_to(Approved));
        assert!(Proposed.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Invested));
        assert!(Invested.can_transition_to(Disbursed));

        assert!(!Proposed.can_transition_to(Invested));
        assert!(!Approved.can_transition_to(Proposed));
        assert!(!Invested.can_transition_to(Approved));
        assert!(!Disbursed.can_transition_to(Invested));
        for next in LoanStatus::ALL {
            assert!(!Rejected.can_transition_to(next));
            assert!(!Disbursed.can_transition_to(next));
        }
    }

    #[test]
    fn test_ensure_status_messages() {
        let loan = loan(dec!(1000), dec!(0));
        let err = loan.ensure_status(LoanStatus::Approved).unwrap_err();
        assert_eq!(err.to_string(), "loan is not approved");
        let err = loan.ensure_status(LoanStatus::Invested).unwrap_err();
        assert_eq!(err.to_string(), "loan is not invested");
        assert!(loan.ensure_status(LoanStatus::Proposed).is_ok());
    }

    #[test]
    fn test_capacity_check() {
        let loan = loan(dec!(1000), dec!(600));
        assert!(loan.ensure_capacity(Amount::new(dec!(400)).unwrap()).is_ok());
        assert!(matches!(
            loan.ensure_capacity(Amount::new(dec!(500)).unwrap()),
            Err(LoanError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_apply_fields_is_partial() {
        let mut stored = loan(dec!(1000), dec!(0));
        let mut working = stored.clone();
        working.invested_amount = Balance::new(dec!(250));
        working.status = LoanStatus::Invested;
        working.borrower_id = "someone-else".to_string();

        stored.apply_fields(&working, &[LoanField::InvestedAmount]);

        assert_eq!(stored.invested_amount, Balance::new(dec!(250)));
        assert_eq!(stored.status, LoanStatus::Proposed);
        assert_eq!(stored.borrower_id, "borrower-1");
    }

    #[test]
    fn test_transition_to_rejects_skips() {
        let mut loan = loan(dec!(1000), dec!(0));
        assert!(loan.transition_to(LoanStatus::Disbursed).is_err());
        assert_eq!(loan.status, LoanStatus::Proposed);
        loan.transition_to(LoanStatus::Approved).unwrap();
        assert_eq!(loan.status, LoanStatus::Approved);
    }
}
