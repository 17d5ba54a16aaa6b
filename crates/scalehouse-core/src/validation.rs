//! # Validation
//!
//! Input validation for transaction drafts and credentials.
//!
//! Failures are reported as a structured list of human-readable messages so
//! the caller can show every problem at once; no partial mutation ever
//! happens on a rejected input. Business-rule outcomes ("no open
//! transaction for this plate") are deliberately NOT validation errors.

use crate::types::{TransactionDraft, TransactionUpdate};

/// Result of validating an input form: `Err` carries one message per
/// problem found, in field order.
pub type ValidationOutcome = Result<(), Vec<String>>;

fn require(messages: &mut Vec<String>, value: &str, label: &str) {
    if value.trim().is_empty() {
        messages.push(format!("{} is required", label));
    }
}

/// Validates a creation draft (leg 1).
pub fn validate_draft(draft: &TransactionDraft) -> ValidationOutcome {
    let mut messages = Vec::new();

    require(&mut messages, &draft.vehicle_number, "vehicle number");
    require(&mut messages, &draft.operator, "operator");
    require(&mut messages, &draft.customer, "customer");
    require(&mut messages, &draft.product, "product");

    if draft.leg1_type.is_none() {
        messages.push("first weighing type is required".to_string());
    }
    if draft.leg1_value == 0 {
        messages.push("first weighing value must not be zero".to_string());
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages)
    }
}

/// Validates a closing update (leg 2).
pub fn validate_update(update: &TransactionUpdate) -> ValidationOutcome {
    let mut messages = Vec::new();

    if update.leg2_type.is_none() {
        messages.push("second weighing type is required".to_string());
    }
    if update.leg2_value == 0 {
        messages.push("second weighing value must not be zero".to_string());
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages)
    }
}

/// Validates an unlock attempt before it reaches the credential store.
pub fn validate_credentials(username: &str, password: &str) -> ValidationOutcome {
    let mut messages = Vec::new();

    require(&mut messages, username, "username");
    require(&mut messages, password, "password");

    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LegType;

    fn valid_draft() -> TransactionDraft {
        TransactionDraft {
            vehicle_number: "N 1234 AB".to_string(),
            operator: "BUDI".to_string(),
            customer: "PT AGRO".to_string(),
            product: "COMPOST".to_string(),
            send_to: String::new(),
            note: String::new(),
            leg1_value: 12000,
            leg1_type: Some(LegType::Inbound),
            leg1_captured_at: None,
            correction_doc_numbers: vec![],
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(validate_draft(&valid_draft()).is_ok());
    }

    #[test]
    fn every_problem_is_reported() {
        let draft = TransactionDraft {
            vehicle_number: "  ".to_string(),
            operator: String::new(),
            leg1_type: None,
            leg1_value: 0,
            ..valid_draft()
        };

        let messages = validate_draft(&draft).unwrap_err();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].contains("vehicle number"));
        assert!(messages.iter().any(|m| m.contains("first weighing type")));
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(validate_credentials("admin", "secret").is_ok());
        let messages = validate_credentials("", "").unwrap_err();
        assert_eq!(messages.len(), 2);
    }
}
