use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::constraint_message;
use crate::models::{NewUser, UserRow};
use crate::{Database, DbError, DbResult, fmt_ts, parse_ts};

impl Database {
    // -- Credential store --

    /// Insert a new account. The existence pre-checks and the UNIQUE
    /// constraints back each other up: a concurrent signup that slips past
    /// the pre-check still surfaces as the right domain error.
    pub fn create_user(&self, user: &NewUser) -> DbResult<DateTime<Utc>> {
        self.with_conn_mut(|conn| {
            if exists_by_id(conn, &user.id)? {
                return Err(DbError::DuplicateId);
            }
            if exists_by_nickname(conn, &user.nickname)? {
                return Err(DbError::DuplicateNickname);
            }

            let created_at = Utc::now();
            let result = conn.execute(
                "INSERT INTO users (id, nickname, password, birthday, gender, job, point, roles, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'USER', ?7)",
                rusqlite::params![
                    user.id,
                    user.nickname,
                    user.password_hash,
                    user.birthday.map(|b| b.to_string()),
                    user.gender.map(|g| g.as_str()),
                    user.job,
                    fmt_ts(created_at),
                ],
            );

            match result {
                Ok(_) => {
                    info!("Account {} has been created", user.id);
                    Ok(created_at)
                }
                Err(e) => Err(map_user_constraint(e)),
            }
        })
    }

    pub fn get_user(&self, id: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_nickname(&self, nickname: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "nickname", nickname))
    }

    pub fn exists_by_id(&self, id: &str) -> DbResult<bool> {
        self.with_conn(|conn| exists_by_id(conn, id))
    }

    pub fn exists_by_nickname(&self, nickname: &str) -> DbResult<bool> {
        self.with_conn(|conn| exists_by_nickname(conn, nickname))
    }

    /// Owner-side profile update. Nickname is always written; the password
    /// hash only when one is supplied. A taken nickname is an error, never a
    /// silent overwrite.
    pub fn update_profile(
        &self,
        id: &str,
        nickname: &str,
        password_hash: Option<&str>,
    ) -> DbResult<UserRow> {
        self.with_conn_mut(|conn| {
            let result = match password_hash {
                Some(hash) => conn.execute(
                    "UPDATE users SET nickname = ?2, password = ?3 WHERE id = ?1",
                    rusqlite::params![id, nickname, hash],
                ),
                None => conn.execute(
                    "UPDATE users SET nickname = ?2 WHERE id = ?1",
                    rusqlite::params![id, nickname],
                ),
            };

            match result {
                Ok(0) => Err(DbError::UserNotFound),
                Ok(_) => query_user(conn, "id", id)?.ok_or(DbError::UserNotFound),
                Err(e) => Err(map_user_constraint(e)),
            }
        })
    }

    // -- Deferred deletion --

    /// Set or clear the pending-deletion mark. Setting it again while already
    /// pending just refreshes the timestamp.
    pub fn update_delete_request_at(
        &self,
        id: &str,
        at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET delete_request_at = ?2 WHERE id = ?1",
                rusqlite::params![id, at.map(fmt_ts)],
            )?;
            if updated == 0 {
                return Err(DbError::UserNotFound);
            }
            Ok(())
        })
    }

    pub fn delete_request_at(&self, id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let row = self.get_user(id)?.ok_or(DbError::UserNotFound)?;
        Ok(row.delete_request_at.as_deref().and_then(parse_ts))
    }

    /// Hard-delete accounts whose deletion request is older than the
    /// retention window. Returns the number of accounts removed.
    ///
    /// The per-account DELETE re-checks the pending mark and the threshold,
    /// so a user who cancels between the SELECT and the DELETE is kept.
    pub fn sweep_expired(&self, now: DateTime<Utc>, retention: TimeDelta) -> DbResult<usize> {
        let threshold = fmt_ts(now - retention);

        let expired: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM users
                 WHERE delete_request_at IS NOT NULL
                   AND delete_request_at <= ?1",
            )?;
            let ids = stmt
                .query_map([&threshold], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;

        let mut removed = 0;
        for id in &expired {
            let deleted = self.with_conn_mut(|conn| {
                Ok(conn.execute(
                    "DELETE FROM users
                     WHERE id = ?1
                       AND delete_request_at IS NOT NULL
                       AND delete_request_at <= ?2",
                    rusqlite::params![id, threshold],
                )?)
            })?;
            if deleted > 0 {
                info!("Deleted user: {}", id);
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn exists_by_id(conn: &Connection, id: &str) -> DbResult<bool> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM users WHERE id = ?1", [id], |row| {
        row.get(0)
    })?;
    Ok(n > 0)
}

fn exists_by_nickname(conn: &Connection, nickname: &str) -> DbResult<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE nickname = ?1",
        [nickname],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub(crate) fn query_user(conn: &Connection, column: &str, value: &str) -> DbResult<Option<UserRow>> {
    // `column` is a compile-time constant ("id" or "nickname"), never user input.
    let sql = format!(
        "SELECT id, nickname, password, birthday, gender, job, point, roles, created_at, delete_request_at
         FROM users WHERE {column} = ?1"
    );

    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                nickname: row.get(1)?,
                password: row.get(2)?,
                birthday: row.get(3)?,
                gender: row.get(4)?,
                job: row.get(5)?,
                point: row.get(6)?,
                roles: row.get(7)?,
                created_at: row.get(8)?,
                delete_request_at: row.get(9)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_user_constraint(e: rusqlite::Error) -> DbError {
    match constraint_message(&e) {
        Some(msg) if msg.contains("users.nickname") => DbError::DuplicateNickname,
        Some(msg) if msg.contains("users.id") => DbError::DuplicateId,
        _ => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn new_user(id: &str, nickname: &str) -> NewUser {
        NewUser {
            id: id.into(),
            nickname: nickname.into(),
            password_hash: "$argon2id$stub".into(),
            birthday: None,
            gender: None,
            job: None,
        }
    }

    fn db_with_users(users: &[(&str, &str)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, nickname) in users {
            db.create_user(&new_user(id, nickname)).unwrap();
        }
        db
    }

    #[test]
    fn duplicate_id_rejected() {
        let db = db_with_users(&[("alice", "Alice")]);
        let err = db.create_user(&new_user("alice", "Other")).unwrap_err();
        assert!(matches!(err, DbError::DuplicateId));
    }

    #[test]
    fn duplicate_nickname_rejected() {
        let db = db_with_users(&[("alice", "Alice")]);
        let err = db.create_user(&new_user("bob", "Alice")).unwrap_err();
        assert!(matches!(err, DbError::DuplicateNickname));
    }

    #[test]
    fn new_account_defaults() {
        let db = db_with_users(&[("alice", "Alice")]);
        let row = db.get_user("alice").unwrap().unwrap();
        assert_eq!(row.point, 0);
        assert_eq!(row.roles, "USER");
        assert!(!row.deletion_requested());
    }

    #[test]
    fn deletion_request_is_idempotent() {
        let db = db_with_users(&[("alice", "Alice")]);

        let first = Utc::now() - TimeDelta::hours(1);
        db.update_delete_request_at("alice", Some(first)).unwrap();
        let stored = db.delete_request_at("alice").unwrap().unwrap();
        // Stored at microsecond precision.
        assert_eq!(fmt_ts(stored), fmt_ts(first));

        // Second request just refreshes the timestamp.
        let second = Utc::now();
        db.update_delete_request_at("alice", Some(second)).unwrap();
        let stored = db.delete_request_at("alice").unwrap().unwrap();
        assert!(stored > first);
    }

    #[test]
    fn cancel_deletion_clears_mark_and_is_a_noop_when_clear() {
        let db = db_with_users(&[("alice", "Alice")]);
        db.update_delete_request_at("alice", Some(Utc::now())).unwrap();
        db.update_delete_request_at("alice", None).unwrap();
        assert_eq!(db.delete_request_at("alice").unwrap(), None);

        // Already clear: still fine.
        db.update_delete_request_at("alice", None).unwrap();
        assert_eq!(db.delete_request_at("alice").unwrap(), None);
    }

    #[test]
    fn deletion_request_for_unknown_user_fails() {
        let db = db_with_users(&[]);
        let err = db
            .update_delete_request_at("ghost", Some(Utc::now()))
            .unwrap_err();
        assert!(matches!(err, DbError::UserNotFound));
    }

    #[test]
    fn sweep_removes_only_expired_accounts() {
        let db = db_with_users(&[("old", "Old"), ("fresh", "Fresh"), ("active", "Active")]);
        let now = Utc::now();

        db.update_delete_request_at("old", Some(now - TimeDelta::days(8)))
            .unwrap();
        db.update_delete_request_at("fresh", Some(now - TimeDelta::days(3)))
            .unwrap();

        let removed = db.sweep_expired(now, TimeDelta::days(7)).unwrap();
        assert_eq!(removed, 1);
        assert!(db.get_user("old").unwrap().is_none());
        assert!(db.get_user("fresh").unwrap().is_some());
        assert!(db.get_user("active").unwrap().is_some());
    }

    #[test]
    fn sweep_skips_account_after_cancellation() {
        let db = db_with_users(&[("alice", "Alice")]);
        let now = Utc::now();
        db.update_delete_request_at("alice", Some(now - TimeDelta::days(8)))
            .unwrap();

        // Cancellation wins: the conditional DELETE re-checks the mark.
        db.update_delete_request_at("alice", None).unwrap();
        let removed = db.sweep_expired(now, TimeDelta::days(7)).unwrap();
        assert_eq!(removed, 0);
        assert!(db.get_user("alice").unwrap().is_some());
    }

    #[test]
    fn sweep_cascades_to_relationship_edges() {
        let db = db_with_users(&[("alice", "Alice"), ("bob", "Bob")]);
        db.request_friend("alice", "bob").unwrap();

        let now = Utc::now();
        db.update_delete_request_at("alice", Some(now - TimeDelta::days(8)))
            .unwrap();
        db.sweep_expired(now, TimeDelta::days(7)).unwrap();

        assert!(db.edges_between("alice", "bob").unwrap().is_empty());
    }

    #[test]
    fn update_profile_rehashes_only_when_password_given() {
        let db = db_with_users(&[("alice", "Alice")]);

        let row = db.update_profile("alice", "Alicia", None).unwrap();
        assert_eq!(row.nickname, "Alicia");
        assert_eq!(row.password, "$argon2id$stub");

        let row = db.update_profile("alice", "Alicia", Some("$argon2id$new")).unwrap();
        assert_eq!(row.password, "$argon2id$new");
    }

    #[test]
    fn update_profile_rejects_taken_nickname() {
        let db = db_with_users(&[("alice", "Alice"), ("bob", "Bob")]);
        let err = db.update_profile("bob", "Alice", None).unwrap_err();
        assert!(matches!(err, DbError::DuplicateNickname));
    }
}
