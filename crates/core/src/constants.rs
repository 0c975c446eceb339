/// Fields owned by the sync layer on a synced account.
pub const SYNCED_ACCOUNT_LOCKS: &[&str] = &[
    "name",
    "classification",
    "subtype",
    "currency",
    "value",
    "cost",
    "ticker",
];

/// Fields owned by the sync layer on a synced transaction.
pub const SYNCED_TRANSACTION_LOCKS: &[&str] =
    &["description", "amount", "currency", "posted_at"];

/// Display name for the cash leg of a decomposed brokerage account.
pub const BROKERAGE_CASH_ACCOUNT_NAME: &str = "Cash";

/// Currency aliases some providers still report; normalized before persisting.
pub const CURRENCY_ALIASES: &[(&str, &str)] = &[("RUR", "RUB")];

/// Normalizes provider-reported currency codes to their current ISO form.
pub fn normalize_currency(code: &str) -> String {
    let upper = code.to_uppercase();
    for (alias, canonical) in CURRENCY_ALIASES {
        if upper == *alias {
            return (*canonical).to_string();
        }
    }
    upper
}
