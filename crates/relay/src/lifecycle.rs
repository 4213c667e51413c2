//! Alias lifecycle
//!
//! Creation (requested or generated name), listing, owner-scoped
//! deletion, and the expiry sweep. Quota and uniqueness enforcement
//! live in the store; this layer validates input, generates names, and
//! maps store outcomes onto caller-facing errors.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::RelayError;
use crate::models::{AccountId, Alias, NewAlias};
use crate::storage::{CreateAliasOutcome, RelayStore};

/// Length of generated local-parts
pub const GENERATED_LOCAL_PART_LEN: usize = 8;

/// Longest accepted requested local-part
pub const MAX_LOCAL_PART_LEN: usize = 30;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Retries when a generated name collides with an existing alias
const GENERATE_ATTEMPTS: usize = 5;

/// Validate a requested local-part: lowercase ASCII letters and digits,
/// 1..=30 characters
pub fn validate_local_part(local_part: &str) -> Result<(), RelayError> {
    let valid = !local_part.is_empty()
        && local_part.len() <= MAX_LOCAL_PART_LEN
        && local_part
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(RelayError::InvalidLocalPart {
            local_part: local_part.to_string(),
        })
    }
}

/// Generate a random 8-character local-part
pub fn generate_local_part() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_LOCAL_PART_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Create an alias with a caller-chosen local-part
pub fn create_named_alias(
    store: &dyn RelayStore,
    account: AccountId,
    local_part: &str,
    domain: &str,
    daily_limit: u32,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Alias, RelayError> {
    validate_local_part(local_part)?;
    let outcome = store.create_alias(NewAlias::new(account, local_part, domain, expires_at), daily_limit)?;
    match outcome {
        CreateAliasOutcome::Created(alias) => {
            log::info!("[ALIAS] Created {} for account {}", alias.address, account.as_i64());
            Ok(alias)
        }
        CreateAliasOutcome::QuotaExceeded => Err(RelayError::QuotaExceeded { limit: daily_limit }),
        CreateAliasOutcome::NameTaken => Err(RelayError::AliasExists {
            local_part: local_part.to_string(),
        }),
    }
}

/// Create an alias with a generated local-part, retrying on collision
pub fn create_generated_alias(
    store: &dyn RelayStore,
    account: AccountId,
    domain: &str,
    daily_limit: u32,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Alias, RelayError> {
    for _ in 0..GENERATE_ATTEMPTS {
        let local_part = generate_local_part();
        let outcome = store.create_alias(
            NewAlias::new(account, &local_part, domain, expires_at),
            daily_limit,
        )?;
        match outcome {
            CreateAliasOutcome::Created(alias) => {
                log::info!(
                    "[ALIAS] Created {} for account {}",
                    alias.address,
                    account.as_i64()
                );
                return Ok(alias);
            }
            CreateAliasOutcome::QuotaExceeded => {
                return Err(RelayError::QuotaExceeded { limit: daily_limit });
            }
            // 36^8 names; a collision means retry with a fresh draw
            CreateAliasOutcome::NameTaken => continue,
        }
    }
    Err(RelayError::Store {
        message: "exhausted generated-name attempts".to_string(),
    })
}

/// List an account's aliases in creation order
pub fn list_aliases(store: &dyn RelayStore, account: AccountId) -> Result<Vec<Alias>, RelayError> {
    Ok(store.list_aliases(account)?)
}

/// Delete an alias the account owns, cascading to its messages
pub fn delete_alias(
    store: &dyn RelayStore,
    account: AccountId,
    local_part: &str,
) -> Result<(), RelayError> {
    if store.delete_alias(account, local_part)? {
        log::info!(
            "[ALIAS] Deleted {} for account {}",
            local_part,
            account.as_i64()
        );
        Ok(())
    } else {
        Err(RelayError::NotFound {
            resource: format!("alias {local_part}"),
        })
    }
}

/// Remove every alias past its expiry, cascading to messages
pub fn expire_sweep(store: &dyn RelayStore, now: DateTime<Utc>) -> Result<usize, RelayError> {
    let removed = store.delete_expired_aliases(now)?;
    if removed > 0 {
        log::info!("[ALIAS] Expired {removed} aliases");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::storage::InMemoryRelayStore;

    const DOMAIN: &str = "example.com";

    #[test]
    fn test_validate_local_part() {
        assert!(validate_local_part("abc123").is_ok());
        assert!(validate_local_part("a").is_ok());
        assert!(validate_local_part(&"a".repeat(30)).is_ok());

        assert!(validate_local_part("").is_err());
        assert!(validate_local_part(&"a".repeat(31)).is_err());
        assert!(validate_local_part("Upper").is_err());
        assert!(validate_local_part("with space").is_err());
        assert!(validate_local_part("dot.ted").is_err());
        assert!(validate_local_part("ünïcode").is_err());
    }

    #[test]
    fn test_generated_local_part_shape() {
        for _ in 0..20 {
            let name = generate_local_part();
            assert_eq!(name.len(), GENERATED_LOCAL_PART_LEN);
            assert!(validate_local_part(&name).is_ok());
        }
    }

    #[test]
    fn test_create_named_and_conflict() {
        let store = InMemoryRelayStore::new();
        let alias =
            create_named_alias(&store, AccountId::new(1), "mine", DOMAIN, 5, None).unwrap();
        assert_eq!(alias.address, "mine@example.com");

        // Nobody can take the name again, the owner included
        let err = create_named_alias(&store, AccountId::new(1), "mine", DOMAIN, 5, None)
            .unwrap_err();
        assert!(matches!(err, RelayError::AliasExists { .. }));
        let err = create_named_alias(&store, AccountId::new(2), "mine", DOMAIN, 5, None)
            .unwrap_err();
        assert!(matches!(err, RelayError::AliasExists { .. }));
    }

    #[test]
    fn test_quota_enforced() {
        let store = InMemoryRelayStore::new();
        let account = AccountId::new(1);
        for i in 0..3 {
            create_named_alias(&store, account, &format!("name{i}"), DOMAIN, 3, None).unwrap();
        }
        let err =
            create_named_alias(&store, account, "onemore", DOMAIN, 3, None).unwrap_err();
        assert!(matches!(err, RelayError::QuotaExceeded { limit: 3 }));
    }

    #[test]
    fn test_generated_alias_created() {
        let store = InMemoryRelayStore::new();
        let alias =
            create_generated_alias(&store, AccountId::new(1), DOMAIN, 5, None).unwrap();
        assert_eq!(alias.local_part.len(), GENERATED_LOCAL_PART_LEN);
        assert!(alias.address.ends_with("@example.com"));
    }

    #[test]
    fn test_delete_requires_ownership() {
        let store = InMemoryRelayStore::new();
        create_named_alias(&store, AccountId::new(1), "mine", DOMAIN, 5, None).unwrap();

        let err = delete_alias(&store, AccountId::new(2), "mine").unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));

        delete_alias(&store, AccountId::new(1), "mine").unwrap();

        // Name is free again after deletion
        create_named_alias(&store, AccountId::new(2), "mine", DOMAIN, 5, None).unwrap();
    }

    #[test]
    fn test_expire_sweep() {
        let store = InMemoryRelayStore::new();
        let now = Utc::now();
        create_named_alias(
            &store,
            AccountId::new(1),
            "shortlived",
            DOMAIN,
            5,
            Some(now - Duration::minutes(1)),
        )
        .unwrap();
        create_named_alias(&store, AccountId::new(1), "forever", DOMAIN, 5, None).unwrap();

        assert_eq!(expire_sweep(&store, now).unwrap(), 1);
        assert!(store.get_alias_by_local_part("shortlived").unwrap().is_none());
        assert!(store.get_alias_by_local_part("forever").unwrap().is_some());
    }
}
