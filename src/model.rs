use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row as stored in the `links` table. `when_read` is empty until the first read.
#[derive(Debug, FromRow)]
pub struct LinkRow {
    pub id: String,
    pub email: String,
    pub when_read: String,
    pub was_read: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub email: String,
    pub when_read: Option<DateTime<Utc>>,
    pub was_read: bool,
    pub is_active: bool,
}

impl Link {
    pub fn state(&self) -> LinkState {
        if self.is_active {
            LinkState::Armed
        } else if self.was_read {
            LinkState::Read
        } else {
            LinkState::New
        }
    }
}

impl TryFrom<LinkRow> for Link {
    type Error = RegistryError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let when_read = match row.when_read.as_str() {
            "" => None,
            text => Some(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|err| RegistryError::Malformed {
                        id: row.id.clone(),
                        reason: format!("when_read {text:?}: {err}"),
                    })?
                    .with_timezone(&Utc),
            ),
        };
        if when_read.is_some() != row.was_read {
            return Err(RegistryError::Malformed {
                id: row.id,
                reason: "when_read and was_read disagree".into(),
            });
        }
        Ok(Link {
            id: row.id,
            email: row.email,
            when_read,
            was_read: row.was_read,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    New,
    Armed,
    Read,
}

/// Outcome of arming a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Armed,
    /// The link already recorded a read and re-arming is disabled.
    AlreadyRead,
    NotFound,
}

/// Outcome of a verification fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The link was armed and the read has now been stamped.
    Recorded,
    /// The link exists but was not armed, nothing changed.
    Ignored,
    Unknown,
}

#[derive(Deserialize)]
pub struct LinkSpecification {
    pub email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedLink {
    pub id: String,
    pub email: String,
    pub verification_url: String,
    pub status_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    #[serde(flatten)]
    pub link: Link,
    pub state: LinkState,
    pub verification_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedLink {
    pub id: String,
    pub is_active: bool,
}
