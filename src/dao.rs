use crate::model::LinkRow;
use sqlx::{Error, SqliteExecutor};

pub const SCHEMA: &str = r#"
    create table if not exists links (
        id text primary key not null,
        email text not null,
        when_read text not null default '',
        was_read integer not null default 0 check (was_read in (0, 1)),
        is_active integer not null default 0 check (is_active in (0, 1)),
        check ((was_read = 1) = (when_read <> ''))
    )
"#;

const STAMP_LAST_READ: &str =
    "update links set when_read = ?, was_read = 1, is_active = 0 where id = ?";
const STAMP_FIRST_READ: &str = r#"
    update links
    set when_read = case when was_read = 1 then when_read else ? end, was_read = 1, is_active = 0
    where id = ?
"#;
const STAMP_LAST_READ_IF_ARMED: &str =
    "update links set when_read = ?, was_read = 1, is_active = 0 where id = ? and is_active = 1";
const STAMP_FIRST_READ_IF_ARMED: &str = r#"
    update links
    set when_read = case when was_read = 1 then when_read else ? end, was_read = 1, is_active = 0
    where id = ? and is_active = 1
"#;

pub async fn create_schema(executor: impl SqliteExecutor<'_>) -> Result<(), Error> {
    sqlx::query(SCHEMA).execute(executor).await?;
    Ok(())
}

pub async fn save(executor: impl SqliteExecutor<'_>, id: &str, email: &str) -> Result<(), Error> {
    sqlx::query(
        "insert into links (id, email, when_read, was_read, is_active) values (?, ?, '', 0, 0)",
    )
    .bind(id)
    .bind(email)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn exists(executor: impl SqliteExecutor<'_>, id: &str) -> Result<bool, Error> {
    sqlx::query_scalar("select exists(select 1 from links where id = ?)")
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn get_by_id(
    executor: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<LinkRow>, Error> {
    sqlx::query_as("select id, email, when_read, was_read, is_active from links where id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn get_active_flag(
    executor: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<bool>, Error> {
    sqlx::query_scalar("select is_active from links where id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Sets `is_active`. With `unread_only` a link that already recorded a read is left alone.
/// Returns the number of rows armed.
pub async fn arm(
    executor: impl SqliteExecutor<'_>,
    id: &str,
    unread_only: bool,
) -> Result<u64, Error> {
    let query = if unread_only {
        "update links set is_active = 1 where id = ? and was_read = 0"
    } else {
        "update links set is_active = 1 where id = ?"
    };
    let result = sqlx::query(query).bind(id).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Marks the link read and disarms it. `keep_first` preserves an existing `when_read`,
/// `armed_only` restricts the update to links whose `is_active` is set.
pub async fn stamp_read(
    executor: impl SqliteExecutor<'_>,
    id: &str,
    when_read: &str,
    keep_first: bool,
    armed_only: bool,
) -> Result<u64, Error> {
    let query = match (keep_first, armed_only) {
        (false, false) => STAMP_LAST_READ,
        (true, false) => STAMP_FIRST_READ,
        (false, true) => STAMP_LAST_READ_IF_ARMED,
        (true, true) => STAMP_FIRST_READ_IF_ARMED,
    };
    let result = sqlx::query(query)
        .bind(when_read)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(executor: impl SqliteExecutor<'_>, id: &str) -> Result<u64, Error> {
    let result = sqlx::query("delete from links where id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
