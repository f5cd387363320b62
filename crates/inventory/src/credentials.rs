use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Deserialize;
use tokio::task;

use crate::error::{Error, Result};
use crate::keys;
use crate::kv::KvStore;

/// Registration payload as it arrives at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn is_reasonable_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    parts.next().is_none()
        && !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

impl Registration {
    /// Checks the payload and returns it with the email normalized.
    ///
    /// Usernames end up inside box keys, so only key-safe characters pass.
    pub fn validate(self) -> Result<Self> {
        let username = self.username.trim().to_string();
        if username.len() < 3 || username.len() > 32 || !keys::is_key_safe(&username) {
            return Err(Error::InvalidInput(
                "username must be 3-32 characters of letters, digits, '.', '_' or '-'".into(),
            ));
        }
        let email = normalize_email(&self.email);
        if !is_reasonable_email(&email) {
            return Err(Error::InvalidInput("invalid email format".into()));
        }
        if self.password.is_empty() || self.password.len() > 128 {
            return Err(Error::InvalidInput("password must be between 1 and 128 characters".into()));
        }
        Ok(Self {
            username,
            email,
            password: self.password,
        })
    }
}

/// Accounts and their uniqueness indices.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Creates an account after checking both uniqueness indices.
    ///
    /// The check and the writes are separate store calls, so two concurrent
    /// registrations of the same name can both succeed.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);

        if self.kv.get(&keys::username_index_key(username)).await?.is_some() {
            return Err(Error::DuplicateUsername);
        }
        if self.kv.get(&keys::email_index_key(&email)).await?.is_some() {
            return Err(Error::DuplicateEmail);
        }

        let password_hash = hash_password(password.to_owned()).await?;

        self.kv
            .set_hash(
                &keys::account_key(&email),
                &[
                    ("username", username.to_string()),
                    ("email", email.clone()),
                    ("password_hash", password_hash),
                ],
            )
            .await?;
        self.kv.set(&keys::username_index_key(username), &email).await?;
        self.kv.set(&keys::email_index_key(&email), username).await?;

        tracing::info!(username, "Registered account");
        Ok(())
    }

    /// Checks a password and returns the username stored on the account.
    pub async fn verify(&self, email: &str, password: &str) -> Result<String> {
        let account = self.account(email).await?.ok_or(Error::NotFound)?;

        let hash = account.password_hash.clone();
        let password = password.to_owned();
        let is_valid = task::spawn_blocking(move || match PasswordHash::new(&hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        })
        .await
        .map_err(|e| Error::Internal(format!("password verification worker failed: {e}")))?;

        if !is_valid {
            tracing::debug!(username = %account.username, "Password mismatch");
            return Err(Error::WrongPassword);
        }
        Ok(account.username)
    }

    pub async fn account(&self, email: &str) -> Result<Option<Account>> {
        let email = normalize_email(email);
        let mut fields = self.kv.get_hash(&keys::account_key(&email)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Account {
            username: fields.remove("username").unwrap_or_default(),
            email: fields.remove("email").unwrap_or(email),
            password_hash: fields.remove("password_hash").unwrap_or_default(),
        }))
    }
}

async fn hash_password(password: String) -> Result<String> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| Error::Internal(format!("password hashing worker failed: {e}")))?
    .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), CredentialStore::new(kv))
    }

    #[tokio::test]
    async fn register_then_verify_returns_username() {
        let (_, creds) = store();
        creds.register("alice", "a@x.com", "pw123").await.unwrap();
        assert_eq!(creds.verify("a@x.com", "pw123").await.unwrap(), "alice");
        assert_eq!(creds.verify("  A@X.com ", "pw123").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn plaintext_is_never_stored() {
        let (kv, creds) = store();
        creds.register("alice", "a@x.com", "pw123").await.unwrap();
        let fields = kv.get_hash(&keys::account_key("a@x.com")).await.unwrap();
        let hash = &fields["password_hash"];
        assert!(hash.starts_with("$argon2"));
        assert!(!fields.values().any(|v| v == "pw123"));
    }

    #[tokio::test]
    async fn duplicates_are_rejected_without_touching_the_account() {
        let (_, creds) = store();
        creds.register("alice", "a@x.com", "pw123").await.unwrap();
        let before = creds.account("a@x.com").await.unwrap().unwrap();

        assert!(matches!(
            creds.register("alice", "other@x.com", "pw").await,
            Err(Error::DuplicateUsername)
        ));
        assert!(matches!(
            creds.register("bob", "a@x.com", "other").await,
            Err(Error::DuplicateEmail)
        ));

        let after = creds.account("a@x.com").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(creds.verify("a@x.com", "pw123").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_distinguished() {
        let (_, creds) = store();
        creds.register("alice", "a@x.com", "pw123").await.unwrap();
        assert!(matches!(creds.verify("b@x.com", "pw123").await, Err(Error::NotFound)));
        assert!(matches!(creds.verify("a@x.com", "nope").await, Err(Error::WrongPassword)));
    }

    #[test]
    fn registration_validation() {
        let ok = Registration {
            username: " alice ".into(),
            email: "A@X.com".into(),
            password: "pw123".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.username, "alice");
        assert_eq!(ok.email, "a@x.com");

        let bad_name = Registration {
            username: "al:ce".into(),
            email: "a@x.com".into(),
            password: "pw".into(),
        };
        assert!(matches!(bad_name.validate(), Err(Error::InvalidInput(_))));

        let bad_email = Registration {
            username: "alice".into(),
            email: "not-an-email".into(),
            password: "pw".into(),
        };
        assert!(matches!(bad_email.validate(), Err(Error::InvalidInput(_))));

        let empty_password = Registration {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: String::new(),
        };
        assert!(matches!(empty_password.validate(), Err(Error::InvalidInput(_))));
    }
}
