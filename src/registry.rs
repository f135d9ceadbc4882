//! Link registry: owns the link records and enforces their lifecycle.
//!
//! A link is created inert (`New`), armed by [`Registry::activate`] (`Armed`) and disarmed
//! again by the first recorded read (`Read`). Deleting removes the row, after which every
//! operation treats the id as unknown. The registry keeps no state of its own between
//! calls; each operation checks a connection out of the pool for its duration.

use crate::dao;
use crate::error::RegistryError;
use crate::model::{Activation, Link, Verification};
use crate::utils::generate_id;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::error::ErrorKind;
use sqlx::SqlitePool;
use std::str::FromStr;

const CREATE_ATTEMPTS: u32 = 5;

/// Which read `when_read` reports once a link has been read more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStamp {
    /// The first recorded read is kept.
    First,
    /// Every recorded read overwrites the timestamp.
    #[default]
    Last,
}

impl FromStr for ReadStamp {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "first" => Ok(ReadStamp::First),
            "last" => Ok(ReadStamp::Last),
            other => Err(format!("expected `first` or `last`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecyclePolicy {
    /// Allow `activate` to arm a link that already recorded a read.
    pub rearm_after_read: bool,
    pub read_stamp: ReadStamp,
}

#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
    policy: LifecyclePolicy,
    clock: fn() -> DateTime<Utc>,
    id_source: fn() -> String,
}

impl Registry {
    pub fn new(pool: SqlitePool, policy: LifecyclePolicy) -> Self {
        Self {
            pool,
            policy,
            clock: Utc::now,
            id_source: generate_id,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_id_source(mut self, id_source: fn() -> String) -> Self {
        self.id_source = id_source;
        self
    }

    #[tracing::instrument(name = "Create link", skip(self, email))]
    pub async fn create(&self, email: &str) -> Result<String, RegistryError> {
        for _ in 0..CREATE_ATTEMPTS {
            let id = (self.id_source)();
            match dao::save(&self.pool, &id, email).await {
                Ok(()) => {
                    tracing::info!(link_id = %id, "Link created");
                    return Ok(id);
                }
                Err(sqlx::Error::Database(db_err))
                    if db_err.kind() == ErrorKind::UniqueViolation =>
                {
                    tracing::warn!(link_id = %id, "Generated link id already taken, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::error!(
            "Could not persist new link. Exhausted all retries of generating a unique id"
        );
        Err(RegistryError::IdSpaceExhausted(CREATE_ATTEMPTS))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, RegistryError> {
        Ok(dao::exists(&self.pool, id).await?)
    }

    /// False for unknown ids as well as for links outside the armed window.
    pub async fn is_active(&self, id: &str) -> Result<bool, RegistryError> {
        Ok(dao::get_active_flag(&self.pool, id).await?.unwrap_or(false))
    }

    #[tracing::instrument(name = "Activate link", skip(self))]
    pub async fn activate(&self, id: &str) -> Result<Activation, RegistryError> {
        let mut tx = self.pool.begin().await?;
        let armed = dao::arm(&mut *tx, id, !self.policy.rearm_after_read).await?;
        let activation = if armed > 0 {
            Activation::Armed
        } else if dao::exists(&mut *tx, id).await? {
            Activation::AlreadyRead
        } else {
            Activation::NotFound
        };
        tx.commit().await?;
        tracing::debug!(?activation, "Activation handled");
        Ok(activation)
    }

    /// Stamps a read on the link regardless of whether it is armed. Unknown ids are ignored.
    /// Under [`ReadStamp::Last`] a repeated call moves `when_read` forward; callers that
    /// want one read per arming should go through [`Registry::verify`].
    #[tracing::instrument(name = "Record link access", skip(self))]
    pub async fn record_access(&self, id: &str) -> Result<(), RegistryError> {
        let stamped =
            dao::stamp_read(&self.pool, id, &self.now(), self.keeps_first(), false).await?;
        if stamped > 0 {
            tracing::info!("Read recorded");
        }
        Ok(())
    }

    /// Handles a verification fetch: records a read only if the link is currently armed.
    #[tracing::instrument(name = "Verify link", skip(self))]
    pub async fn verify(&self, id: &str) -> Result<Verification, RegistryError> {
        let mut tx = self.pool.begin().await?;
        let stamped = dao::stamp_read(&mut *tx, id, &self.now(), self.keeps_first(), true).await?;
        let verification = if stamped > 0 {
            Verification::Recorded
        } else if dao::exists(&mut *tx, id).await? {
            Verification::Ignored
        } else {
            Verification::Unknown
        };
        tx.commit().await?;
        match verification {
            Verification::Recorded => tracing::info!("Read recorded"),
            _ => tracing::debug!(?verification, "No read recorded"),
        }
        Ok(verification)
    }

    #[tracing::instrument(name = "Delete link", skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        if dao::delete(&self.pool, id).await? > 0 {
            tracing::info!("Link deleted");
        }
        Ok(())
    }

    pub async fn snapshot(&self, id: &str) -> Result<Option<Link>, RegistryError> {
        dao::get_by_id(&self.pool, id)
            .await?
            .map(Link::try_from)
            .transpose()
    }

    fn now(&self) -> String {
        (self.clock)().to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    fn keeps_first(&self) -> bool {
        self.policy.read_stamp == ReadStamp::First
    }
}
