use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

use staybook_core::{DomainError, DomainResult};

/// Permission code (e.g. "houses.manage").
///
/// Codes compare case-insensitively: they are folded to lowercase on
/// construction, so equality and hashing work on the folded form.
/// The wildcard `"*"` is only ever produced for SuperUser reports and is never
/// looked up in a grant store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(fold(code.into()))
    }

    /// Parse a caller-supplied code, rejecting blank input.
    pub fn parse(code: &str) -> DomainResult<Self> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("permission code must not be empty"));
        }
        Ok(Self::new(trimmed.to_string()))
    }

    pub fn wildcard() -> Self {
        Self(Cow::Borrowed("*"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Leading segment of a dotted code ("houses" for "houses.manage").
    pub fn category(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

fn fold(code: Cow<'static, str>) -> Cow<'static, str> {
    if code.chars().any(char::is_uppercase) {
        Cow::Owned(code.to_lowercase())
    } else {
        code
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn codes_compare_case_insensitively() {
        assert_eq!(Permission::new("Houses.Manage"), Permission::new("houses.manage"));
        assert_eq!(Permission::new("HOUSES.MANAGE").as_str(), "houses.manage");
    }

    #[test]
    fn parse_rejects_blank_codes() {
        assert!(Permission::parse("   ").is_err());
        assert_eq!(Permission::parse(" tours.view ").unwrap().as_str(), "tours.view");
    }

    #[test]
    fn category_is_leading_segment() {
        assert_eq!(Permission::new("exchange.rates.edit").category(), "exchange");
        assert_eq!(Permission::new("plain").category(), "plain");
    }

    #[test]
    fn deserialization_folds_case() {
        let p: Permission = serde_json::from_str("\"Reports.View\"").unwrap();
        assert_eq!(p, Permission::new("reports.view"));
    }

    proptest! {
        #[test]
        fn folding_is_idempotent_and_case_blind(code in "[a-zA-Z]{1,12}(\\.[a-zA-Z]{1,12}){0,3}") {
            let upper = Permission::new(code.to_uppercase());
            let lower = Permission::new(code.to_lowercase());
            prop_assert_eq!(&upper, &lower);
            prop_assert_eq!(Permission::new(upper.as_str().to_string()), upper);
        }
    }
}
