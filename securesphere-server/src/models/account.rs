//! Account fields: username, email, password

use once_cell::sync::Lazy;
use regex::Regex;

use super::validation::required;
use super::ValidationError;

const MAX_USERNAME_LEN: usize = 80;
const MAX_EMAIL_LEN: usize = 120;
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("invalid email regex")
});

/// Validated login name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Trimmed, at most 80 characters, no inner whitespace.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let name = required("username", s, MAX_USERNAME_LEN)?;
        if name.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let email = required("email", s, MAX_EMAIL_LEN)?;
        if !EMAIL_RE.is_match(&email) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "invalid email format",
            });
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A plaintext password that passed the strength rules, ready for hashing
#[derive(Clone, PartialEq, Eq)]
pub struct NewPassword(String);

impl NewPassword {
    /// At least 8 characters with an uppercase letter, a lowercase letter
    /// and a digit. Used for registration and lead accounts.
    pub fn strong(s: &str) -> Result<Self, ValidationError> {
        if s.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        let upper = s.chars().any(|c| c.is_ascii_uppercase());
        let lower = s.chars().any(|c| c.is_ascii_lowercase());
        let digit = s.chars().any(|c| c.is_ascii_digit());
        if !(upper && lower && digit) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must include uppercase, lowercase, and number",
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Password change: at least 8 characters and equal to the confirmation.
    pub fn confirmed(new: &str, confirm: &str) -> Result<Self, ValidationError> {
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "new_password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if new != confirm {
            return Err(ValidationError::Mismatch {
                field: "new_password",
                other: "confirm_password",
            });
        }
        Ok(Self(new.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for NewPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NewPassword(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert_eq!(Username::new(" alice ").unwrap().as_str(), "alice");
        assert!(Username::new("").is_err());
        assert!(Username::new("al ice").is_err());
        assert!(Username::new(&"a".repeat(81)).is_err());
    }

    #[test]
    fn emails() {
        assert!(Email::new("a.b+c@example.co.uk").is_ok());
        assert!(Email::new("no-at-sign.example.com").is_err());
        assert!(Email::new("x@localhost").is_err());
        assert!(Email::new("x@exa_mple.com").is_err());
    }

    #[test]
    fn strong_passwords() {
        assert!(NewPassword::strong("Secret123").is_ok());
        assert!(matches!(
            NewPassword::strong("Sh0rt"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(NewPassword::strong("alllowercase1").is_err());
        assert!(NewPassword::strong("ALLUPPERCASE1").is_err());
        assert!(NewPassword::strong("NoDigitsHere").is_err());
    }

    #[test]
    fn confirmed_passwords() {
        assert!(NewPassword::confirmed("longenough", "longenough").is_ok());
        assert!(matches!(
            NewPassword::confirmed("longenough", "different"),
            Err(ValidationError::Mismatch { .. })
        ));
        assert!(NewPassword::confirmed("short", "short").is_err());
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = NewPassword::strong("Secret123").unwrap();
        assert_eq!(format!("{:?}", p), "NewPassword(***)");
    }
}
