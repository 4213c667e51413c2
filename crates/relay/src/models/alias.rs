//! Alias model representing one disposable address

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the account (chat destination) that owns an alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Row identifier for an alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasId(pub i64);

impl AliasId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A disposable mail address owned by one account
///
/// Aliases are immutable after creation; the only mutation is deletion,
/// which cascades to all messages delivered to the alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub id: AliasId,
    /// Owning account
    pub account: AccountId,
    /// Portion of the address before the `@` (globally unique)
    pub local_part: String,
    /// Full address, `local_part@domain`
    pub address: String,
    pub created_at: DateTime<Utc>,
    /// Calendar day of creation, used for the daily creation quota
    pub created_on: NaiveDate,
    /// Absolute expiry; `None` means the alias never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl Alias {
    /// Whether the alias has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Payload for inserting a new alias row
#[derive(Debug, Clone)]
pub struct NewAlias {
    pub account: AccountId,
    pub local_part: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewAlias {
    /// Build a new alias payload stamped with the current time
    pub fn new(
        account: AccountId,
        local_part: impl Into<String>,
        domain: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let local_part = local_part.into();
        let address = format!("{}@{}", local_part, domain);
        Self {
            account,
            local_part,
            address,
            created_at: Utc::now(),
            expires_at,
        }
    }

    /// Calendar day the alias is created on (quota day)
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}
