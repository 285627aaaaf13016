/*!
 * # Password Policy
 *
 * Complexity rules applied on registration, password reset and password
 * change. The accepted special characters are `@$!%*?&`.
 */

use thiserror::Error;

pub const SPECIAL_CHARS: &str = "@$!%*?&";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password must be between {min_length} and {max_length} characters long")]
    Length { min_length: usize, max_length: usize },

    #[error("Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character (@$!%*?&)")]
    MissingCharacterClass,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
        }
    }
}

impl PasswordPolicy {
    /// Validate a password against the policy
    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < self.min_length || length > self.max_length {
            return Err(PasswordPolicyError::Length {
                min_length: self.min_length,
                max_length: self.max_length,
            });
        }

        let missing = (self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()))
            || (self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()))
            || (self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()))
            || (self.require_special_chars && !password.chars().any(|c| SPECIAL_CHARS.contains(c)));

        if missing {
            return Err(PasswordPolicyError::MissingCharacterClass);
        }

        Ok(())
    }
}

/// `validator` hook for request DTOs carrying a new password.
pub fn validate_password_strength(password: &str) -> Result<(), validator::ValidationError> {
    PasswordPolicy::default().validate(password).map_err(|err| {
        let mut error = validator::ValidationError::new("password_policy");
        error.message = Some(err.to_string().into());
        error
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_password_with_every_character_class() {
        assert!(PasswordPolicy::default().validate("Secur3P@ss").is_ok());
    }

    #[test]
    fn rejects_short_and_long_passwords() {
        let policy = PasswordPolicy::default();
        assert!(matches!(
            policy.validate("S3c@r"),
            Err(PasswordPolicyError::Length { .. })
        ));
        let long = format!("Aa1@{}", "x".repeat(125));
        assert!(matches!(
            policy.validate(&long),
            Err(PasswordPolicyError::Length { .. })
        ));
    }

    #[test]
    fn rejects_missing_character_classes() {
        let policy = PasswordPolicy::default();
        for candidate in ["secur3p@ss", "SECUR3P@SS", "SecureP@ss", "Secur3Pass"] {
            assert_eq!(
                policy.validate(candidate),
                Err(PasswordPolicyError::MissingCharacterClass),
                "{candidate} should be rejected"
            );
        }
    }

    #[test]
    fn special_characters_outside_the_accepted_set_do_not_count() {
        assert_eq!(
            PasswordPolicy::default().validate("Secur3P#ss"),
            Err(PasswordPolicyError::MissingCharacterClass)
        );
    }

    #[test]
    fn validator_hook_carries_the_policy_message() {
        let err = validate_password_strength("weak").unwrap_err();
        assert!(err
            .message
            .unwrap()
            .contains("between 8 and 128 characters"));
    }
}
