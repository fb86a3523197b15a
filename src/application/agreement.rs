use crate::domain::investment::NewInvestment;
use crate::domain::loan::Loan;
use crate::domain::ports::AgreementLetterGenerator;
use crate::error::Result;
use async_trait::async_trait;

/// Default generator: investments carry an empty agreement-letter reference
/// until a real document service is plugged in.
#[derive(Debug, Default, Clone)]
pub struct BlankAgreementLetter;

#[async_trait]
impl AgreementLetterGenerator for BlankAgreementLetter {
    async fn generate(&self, _loan: &Loan, _investment: &NewInvestment) -> Result<String> {
        Ok(String::new())
    }
}
