use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            _ => Err(()),
        }
    }
}

/// Status actually persisted on a relationship edge. Restricted on purpose:
/// the read-side `RelationView` adds derived values that must never be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeStatus {
    Request,
    Friend,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Request => "REQUEST",
            EdgeStatus::Friend => "FRIEND",
        }
    }
}

impl FromStr for EdgeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUEST" => Ok(EdgeStatus::Request),
            "FRIEND" => Ok(EdgeStatus::Friend),
            _ => Err(()),
        }
    }
}

/// What a user sees when asking "what is my relationship to X".
/// `NotYet` and `You` are synthesized at query time, never written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationView {
    #[serde(rename = "REQUEST")]
    Request,
    #[serde(rename = "FRIEND")]
    Friend,
    #[serde(rename = "NOTYET")]
    NotYet,
    #[serde(rename = "YOU")]
    You,
}

impl From<EdgeStatus> for RelationView {
    fn from(status: EdgeStatus) -> Self {
        match status {
            EdgeStatus::Request => RelationView::Request,
            EdgeStatus::Friend => RelationView::Friend,
        }
    }
}

impl fmt::Display for RelationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationView::Request => "REQUEST",
            RelationView::Friend => "FRIEND",
            RelationView::NotYet => "NOTYET",
            RelationView::You => "YOU",
        };
        f.write_str(s)
    }
}

/// Another user plus the caller's relationship to them. Returned by the
/// friend lists, the request lists, and the lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSummary {
    pub id: String,
    pub nickname: String,
    pub status: RelationView,
}

/// Public account view. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub job: Option<String>,
    pub point: i64,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub delete_request_at: Option<DateTime<Utc>>,
}
