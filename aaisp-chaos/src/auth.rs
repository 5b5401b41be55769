//! API credentials
//!
//! The API accepts either account authentication (account number and
//! password) or control authentication (control login and password).
//! A control login may also accompany account authentication.

use crate::error::ChaosError;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub account_number: String,
    pub account_password: String,
    pub control_login: String,
    pub control_password: String,
}

impl Auth {
    /// Control-login credentials, as used by the exporter.
    pub fn control(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            control_login: login.into(),
            control_password: password.into(),
            ..Default::default()
        }
    }

    /// Account-number credentials.
    pub fn account(number: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account_number: number.into(),
            account_password: password.into(),
            ..Default::default()
        }
    }

    /// Something has to be sent. Incomplete pairs are left for the API to reject.
    pub fn validate(&self) -> Result<(), ChaosError> {
        if self.form().is_empty() {
            return Err(ChaosError::Credentials);
        }
        Ok(())
    }

    /// Form fields sent with every request. Empty fields are left out.
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        [
            ("account_number", self.account_number.as_str()),
            ("account_password", self.account_password.as_str()),
            ("control_login", self.control_login.as_str()),
            ("control_password", self.control_password.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &str| if s.is_empty() { "" } else { "***" };
        f.debug_struct("Auth")
            .field("account_number", &self.account_number)
            .field("account_password", &redact(&self.account_password))
            .field("control_login", &self.control_login)
            .field("control_password", &redact(&self.control_password))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_skips_empty_fields() {
        let auth = Auth::control("ab12@a", "secret");
        assert_eq!(
            auth.form(),
            vec![("control_login", "ab12@a"), ("control_password", "secret")]
        );

        let auth = Auth {
            account_number: "A1234A".to_string(),
            account_password: "pw".to_string(),
            control_login: "ab12@a".to_string(),
            control_password: String::new(),
        };
        assert_eq!(
            auth.form(),
            vec![
                ("account_number", "A1234A"),
                ("account_password", "pw"),
                ("control_login", "ab12@a"),
            ]
        );
    }

    #[test]
    fn test_validate() {
        assert!(Auth::control("ab12@a", "secret").validate().is_ok());
        assert!(Auth::account("A1234A", "pw").validate().is_ok());
        assert!(Auth::default().validate().is_err());
        assert!(Auth::control("", "").validate().is_err());
        // Half a pair still goes out; the API decides.
        assert!(Auth::control("ab12@a", "").validate().is_ok());
        assert!(Auth::account("", "pw").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let printed = format!("{:?}", Auth::control("ab12@a", "secret"));
        assert!(printed.contains("ab12@a"));
        assert!(!printed.contains("secret"));
    }
}
