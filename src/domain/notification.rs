use super::investment::Investment;
use serde::{Deserialize, Serialize};

pub const AGREEMENT_LETTER_SUBJECT: &str = "Loan Agreement Letter";
pub const AGREEMENT_LETTER_BODY: &str = "Please find the agreement letter attached to this email.";
pub const AGREEMENT_LETTER_FILENAME: &str = "agreement_letter.pdf";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Email-style message handed to a [`Notifier`](super::ports::Notifier).
///
/// `to` is an investor identifier; resolving it to an address is the
/// notification service's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotification {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Reference to the content (URL), not the bytes.
    pub content: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

impl EmailNotification {
    pub fn agreement_letter(investment: &Investment) -> Self {
        Self {
            to: investment.investor_id.clone(),
            subject: AGREEMENT_LETTER_SUBJECT.to_string(),
            body: AGREEMENT_LETTER_BODY.to_string(),
            attachments: vec![Attachment {
                filename: AGREEMENT_LETTER_FILENAME.to_string(),
                content: investment.agreement_letter_url.clone(),
                media_type: PDF_MEDIA_TYPE.to_string(),
            }],
        }
    }
}
