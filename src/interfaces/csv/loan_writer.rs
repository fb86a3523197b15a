use crate::domain::loan::Loan;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

/// Flat CSV row for a loan snapshot.
#[derive(Debug, Serialize)]
struct LoanRecord<'a> {
    uuid: Uuid,
    borrower_id: &'a str,
    principal_amount: Decimal,
    interest_rate: Decimal,
    roi_rate: Decimal,
    invested_amount: Decimal,
    status: &'static str,
}

impl<'a> From<&'a Loan> for LoanRecord<'a> {
    fn from(loan: &'a Loan) -> Self {
        Self {
            uuid: loan.uuid,
            borrower_id: &loan.borrower_id,
            principal_amount: loan.principal_amount.value(),
            interest_rate: loan.interest_rate.value(),
            roi_rate: loan.roi_rate.value(),
            invested_amount: loan.invested_amount.value(),
            status: loan.status.as_str(),
        }
    }
}

/// Writes loan snapshots as CSV, header first.
pub struct LoanWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LoanWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_loans<'a>(&mut self, loans: impl IntoIterator<Item = &'a Loan>) -> Result<()> {
        for loan in loans {
            self.writer.serialize(LoanRecord::from(loan))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
