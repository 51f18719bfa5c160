use crate::errors::ServerError;
use crate::schema::memos;

use diesel::{Insertable, Queryable};
use serde_derive::Deserialize;
use std::time::{Duration, SystemTime};

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// A memo is gone the instant its expiry is reached, whether or not the row
/// has been physically deleted yet. Every lazy-deletion path goes through
/// this; the sweeper's SQL filter is the set-level form of the same check.
pub fn expired(expires_at: SystemTime, now: SystemTime) -> bool {
    expires_at <= now
}

pub fn expiry_after(now: SystemTime, minutes: i32) -> Result<SystemTime, ServerError> {
    if minutes < 1 {
        return Err(ServerError::UserError("duration must be at least 1 minute"));
    }

    now.checked_add(Duration::from_secs(minutes as u64 * 60))
        .ok_or(ServerError::UserError("duration is too long"))
}

#[derive(Clone, Debug, Queryable)]
pub struct QueryMemo {
    pub password: String,
    pub content: String,
    pub duration_minutes: i32,
    pub expires_at: SystemTime,
    pub last_updated: SystemTime,
}

impl QueryMemo {
    pub fn has_expired(&self, now: SystemTime) -> bool {
        expired(self.expires_at, now)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReqMemo {
    pub password: String,
    pub content: Option<String>,
    pub duration: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = memos)]
pub struct InsertMemo {
    pub password: String,
    pub content: String,
    pub duration_minutes: i32,
    pub expires_at: SystemTime,
    pub last_updated: SystemTime,
}

impl ReqMemo {
    pub fn into_insertable(self, now: SystemTime) -> Result<InsertMemo, ServerError> {
        let minutes = self.duration.unwrap_or(DEFAULT_DURATION_MINUTES);

        Ok(InsertMemo {
            password: self.password,
            content: self.content.unwrap_or_default(),
            duration_minutes: minutes,
            expires_at: expiry_after(now, minutes)?,
            last_updated: now,
        })
    }
}
