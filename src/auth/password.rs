//! Password hashing with Argon2id and the account password policy.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;

/// Special characters accepted by the password policy.
pub const SPECIAL_CHARS: &str = "@$!%*?&";

/// Passwords must be at least `min_length` characters and contain an upper
/// case letter, a lower case letter, a digit and one of [`SPECIAL_CHARS`].
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PasswordPolicyError::MissingUppercase);
        }

        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PasswordPolicyError::MissingLowercase);
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }

        if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            return Err(PasswordPolicyError::MissingSpecial);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    TooShort { min_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
}

impl std::fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordPolicyError::TooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PasswordPolicyError::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            PasswordPolicyError::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            PasswordPolicyError::MissingDigit => {
                write!(f, "Password must contain at least one digit")
            }
            PasswordPolicyError::MissingSpecial => {
                write!(
                    f,
                    "Password must contain at least one special character ({})",
                    SPECIAL_CHARS
                )
            }
        }
    }
}

impl std::error::Error for PasswordPolicyError {}

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        Self::hash_password_with_cost(password, 12)
    }

    /// Hashes a password using Argon2id. The cost parameter is the log2 of
    /// the memory usage in KiB (12 for development, 16+ for production).
    pub fn hash_password_with_cost(
        password: &str,
        memory_cost_log2: u32,
    ) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let m_cost = 1u32 << memory_cost_log2.min(22);

        let params =
            Params::new(m_cost, 3, 1, None).map_err(|_| argon2::password_hash::Error::Algorithm)?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    pub fn verify_password(
        password: &str,
        password_hash: &str,
    ) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(password_hash)?;
        let argon2 = Argon2::default();
        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let password = "Obra2024!secure";
        let hash =
            PasswordService::hash_password_with_cost(password, 4).expect("Hashing should succeed");

        assert!(hash.starts_with("$argon2id$"));
        let is_valid =
            PasswordService::verify_password(password, &hash).expect("Verification should succeed");
        assert!(is_valid);
    }

    #[test]
    fn test_wrong_password_fails() {
        let hash = PasswordService::hash_password_with_cost("Correct1!", 4)
            .expect("Hashing should succeed");

        let is_valid = PasswordService::verify_password("Wrong1!aa", &hash)
            .expect("Verification should succeed");
        assert!(!is_valid);
    }

    #[test]
    fn test_unique_salts() {
        let hash1 = PasswordService::hash_password_with_cost("Same1!pwd", 4).unwrap();
        let hash2 = PasswordService::hash_password_with_cost("Same1!pwd", 4).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_policy_accepts_compliant_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Password1!").is_ok());
        assert!(policy.validate("Obra$2024").is_ok());
    }

    #[test]
    fn test_policy_rejects_each_missing_class() {
        let policy = PasswordPolicy::default();

        assert_eq!(
            policy.validate("Sh0rt!a"),
            Err(PasswordPolicyError::TooShort { min_length: 8 })
        );
        assert_eq!(
            policy.validate("password1!"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            policy.validate("PASSWORD1!"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            policy.validate("Password!!"),
            Err(PasswordPolicyError::MissingDigit)
        );
        assert_eq!(
            policy.validate("Password12"),
            Err(PasswordPolicyError::MissingSpecial)
        );
    }

    #[test]
    fn test_policy_special_set_is_exact() {
        let policy = PasswordPolicy::default();
        // '#' is not in the accepted special set.
        assert_eq!(
            policy.validate("Password1#"),
            Err(PasswordPolicyError::MissingSpecial)
        );
        assert!(policy.validate("Password1&").is_ok());
    }

    #[test]
    fn test_policy_error_messages() {
        let policy = PasswordPolicy::new(10);
        let err = policy.validate("Short1!").unwrap_err();
        assert!(err.to_string().contains("10 characters"));
    }
}
