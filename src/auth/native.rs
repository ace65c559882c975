//! Email/password accounts. They live in the same users collection as
//! provider identities but get plain UUID uids without a namespace prefix.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{error, info, warn};

use super::auth::{Auth, ExchangeOutcome};
use super::password::{hash_password, verify_password};
use crate::error::{AppError, ValidationError};
use crate::models::user::UserIdentity;
use crate::store::NativeAccount;

pub const MIN_PASSWORD_CHARS: usize = 6;
const NATIVE_PROVIDER: &str = "password";

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Checks a registration form without touching the store.
pub fn validate_registration(
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() || confirm_password.is_empty() {
        return Err(ValidationError::MissingField);
    }
    if !is_plausible_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::WeakPassword {
            min: MIN_PASSWORD_CHARS,
        });
    }
    Ok(email.to_lowercase())
}

impl Auth {
    /// Creates an email/password identity and signs it in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<ExchangeOutcome, AppError> {
        let started = Instant::now();
        let result = self.run_register(email, password, confirm_password).await;
        self.record(NATIVE_PROVIDER, started, &result);
        result
    }

    async fn run_register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<ExchangeOutcome, AppError> {
        let email = validate_registration(email, password, confirm_password)?;

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Backend(format!("Hashing task failed: {}", e)))?
            .map_err(AppError::Backend)?;

        let account = NativeAccount {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            password_hash,
        };
        let created = self.store.create_native_account(&account).await.map_err(|e| {
            error!("Failed to create account: {}", e);
            AppError::Store(e)
        })?;
        if !created {
            info!("Registration for an existing email was refused");
            return Err(AppError::EmailInUse);
        }

        let identity = UserIdentity {
            uid: account.uid,
            email: Some(email),
            display_name: None,
            photo_url: None,
        };
        self.issue(identity, HashMap::new()).await
    }

    /// Signs in an email/password identity.
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<ExchangeOutcome, AppError> {
        let started = Instant::now();
        let result = self.run_login(email, password).await;
        self.record(NATIVE_PROVIDER, started, &result);
        result
    }

    async fn run_login(&self, email: &str, password: &str) -> Result<ExchangeOutcome, AppError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingField.into());
        }

        let account = self
            .store
            .get_native_account(email)
            .await
            .map_err(AppError::Store)?
            .ok_or(AppError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Backend(format!("Verification task failed: {}", e)))?
            .map_err(|e| {
                error!("Stored hash for '{}' is unusable: {}", account.uid, e);
                AppError::Backend(e)
            })?;
        if !matches {
            warn!("Wrong password for account '{}'", account.uid);
            return Err(AppError::InvalidCredentials);
        }

        let identity = match self.store.get_user(&account.uid).await {
            Ok(Some(user)) => user,
            Ok(None) => UserIdentity {
                email: Some(account.email.clone()),
                ..UserIdentity::bare(account.uid.clone())
            },
            Err(e) => return Err(AppError::Store(e)),
        };
        self.issue(identity, HashMap::new()).await
    }
}
