//! Provider-specific account type mapping tables.
//!
//! These tables are business rules, reproduced exactly. Unknown values fall
//! through to asset/depository rather than failing a sync.

use ledgerlink_core::accounts::{AccountClassification, AccountSubtype};

/// EnableBanking `cash_account_type` mapping.
pub fn map_enable_banking_type(
    cash_account_type: Option<&str>,
) -> (AccountClassification, AccountSubtype) {
    match cash_account_type {
        Some("LOAN") => (AccountClassification::Liability, AccountSubtype::Loan),
        Some("CARD") => (AccountClassification::Liability, AccountSubtype::CreditCard),
        Some("SVGS") => (AccountClassification::Asset, AccountSubtype::Depository),
        _ => (AccountClassification::Asset, AccountSubtype::Depository),
    }
}

/// Teller account type mapping. Subtype values beyond "credit" are ignored.
pub fn map_teller_type(account_type: &str) -> (AccountClassification, AccountSubtype) {
    if account_type == "credit" {
        (AccountClassification::Liability, AccountSubtype::CreditCard)
    } else {
        (AccountClassification::Asset, AccountSubtype::Depository)
    }
}

/// SaltEdge `nature` mapping: classification from the liability set, subtype
/// from the per-nature table.
pub fn map_salt_edge_nature(nature: &str) -> (AccountClassification, AccountSubtype) {
    let classification = match nature {
        "credit_card" | "credit" | "loan" | "mortgage" => AccountClassification::Liability,
        _ => AccountClassification::Asset,
    };
    let subtype = match nature {
        "checking" | "savings" | "card" | "debit_card" | "ewallet" | "insurance" | "bonus" => {
            AccountSubtype::Depository
        }
        "credit_card" | "credit" => AccountSubtype::CreditCard,
        "loan" | "mortgage" => AccountSubtype::Loan,
        "investment" => AccountSubtype::Brokerage,
        _ => AccountSubtype::Depository,
    };
    (classification, subtype)
}
