//! Locked attribute tracking for synced records.
//!
//! The sync layer marks the fields it owns on a record; user-initiated
//! updates must not modify any field present in the map. Serialized as a
//! JSON object of `field -> true` so the stored shape stays readable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Set-valued map of field name -> locked, attached to accounts and
/// transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockedAttributes(BTreeMap<String, bool>);

impl LockedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a lock set from a list of field names.
    pub fn from_fields(fields: &[&str]) -> Self {
        Self(
            fields
                .iter()
                .map(|f| ((*f).to_string(), true))
                .collect(),
        )
    }

    pub fn lock(&mut self, field: &str) {
        self.0.insert(field.to_string(), true);
    }

    pub fn is_locked(&self, field: &str) -> bool {
        self.0.get(field).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        !self.0.values().any(|locked| *locked)
    }

    /// Returns the subset of `fields` that is locked, in input order.
    pub fn blocked_fields(&self, fields: &[&str]) -> Vec<String> {
        fields
            .iter()
            .filter(|f| self.is_locked(f))
            .map(|f| (*f).to_string())
            .collect()
    }

    /// Fails with `Error::LockedAttributes` if any of `fields` is locked.
    pub fn ensure_unlocked(&self, fields: &[&str]) -> Result<()> {
        let blocked = self.blocked_fields(fields);
        if blocked.is_empty() {
            Ok(())
        } else {
            Err(Error::LockedAttributes(blocked))
        }
    }

    /// Parses the JSON text stored in the database; `None`/empty means no locks.
    pub fn from_json(json: Option<&str>) -> Self {
        json.filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_fields_subset() {
        let locks = LockedAttributes::from_fields(&["value", "currency"]);
        assert_eq!(
            locks.blocked_fields(&["name", "value", "currency"]),
            vec!["value".to_string(), "currency".to_string()]
        );
        assert!(locks.blocked_fields(&["name"]).is_empty());
    }

    #[test]
    fn test_ensure_unlocked_names_blocked_fields() {
        let locks = LockedAttributes::from_fields(&["amount"]);
        let err = locks.ensure_unlocked(&["amount", "description"]).unwrap_err();
        match err {
            Error::LockedAttributes(fields) => assert_eq!(fields, vec!["amount".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let locks = LockedAttributes::from_fields(&["value"]);
        let json = locks.to_json();
        let parsed = LockedAttributes::from_json(Some(&json));
        assert!(parsed.is_locked("value"));
        assert!(!parsed.is_locked("name"));
    }

    #[test]
    fn test_from_json_tolerates_garbage() {
        assert!(LockedAttributes::from_json(None).is_empty());
        assert!(LockedAttributes::from_json(Some("")).is_empty());
        assert!(LockedAttributes::from_json(Some("not json")).is_empty());
    }
}
