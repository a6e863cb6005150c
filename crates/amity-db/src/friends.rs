//! The friendship state machine.
//!
//! A mutual friendship is two directed edges, one per owner. Every mutation
//! that touches both edges (acceptance, unfriend) runs inside a single
//! SQLite transaction so readers never observe one edge promoted and its
//! mirror stale.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use amity_types::models::{EdgeStatus, RelationSummary, RelationView};

use crate::users::query_user;
use crate::error::constraint_message;
use crate::models::FriendRow;
use crate::{Database, DbError, DbResult, fmt_ts};

impl Database {
    /// Send a friend request from `requester` to `target`.
    ///
    /// When the reverse request already exists this call is an acceptance:
    /// both edges end up FRIEND in one transaction, so neither party has to
    /// know who asked first. A repeated request with no reverse edge is a
    /// no-op that returns the still-pending state.
    pub fn request_friend(&self, requester: &str, target: &str) -> DbResult<RelationSummary> {
        if requester == target {
            return Err(DbError::SelfRequest);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let target_nickname = nickname_of(&tx, target)?.ok_or(DbError::UserNotFound)?;

            let forward = edge_status(&tx, requester, target)?;
            let reverse = edge_status(&tx, target, requester)?;

            let status = match (forward, reverse) {
                // Simultaneous mutual requests collapse into acceptance.
                (Some(EdgeStatus::Request), Some(EdgeStatus::Request)) => {
                    promote_pair(&tx, requester, target)?;
                    tx.commit()?;
                    RelationView::Friend
                }
                // Already pending; don't spam another edge.
                (Some(EdgeStatus::Request), _) => RelationView::Request,
                // The other side already asked: requesting back accepts.
                (None, Some(EdgeStatus::Request)) => {
                    promote_pair(&tx, requester, target)?;
                    tx.execute(
                        "INSERT INTO friends (owner_id, target_id, status, created_at)
                         VALUES (?1, ?2, 'FRIEND', ?3)",
                        rusqlite::params![requester, target, fmt_ts(Utc::now())],
                    )?;
                    tx.commit()?;
                    RelationView::Friend
                }
                _ => {
                    let inserted = tx.execute(
                        "INSERT INTO friends (owner_id, target_id, status, created_at)
                         VALUES (?1, ?2, 'REQUEST', ?3)",
                        rusqlite::params![requester, target, fmt_ts(Utc::now())],
                    );
                    if let Err(e) = inserted {
                        return Err(map_friend_constraint(e));
                    }
                    tx.commit()?;
                    RelationView::Request
                }
            };

            Ok(RelationSummary {
                id: target.into(),
                nickname: target_nickname,
                status,
            })
        })
    }

    /// Accept the pending request from `requester`. Creates the reverse edge
    /// if `accepter` never requested back, then promotes both to FRIEND.
    pub fn accept_friend(&self, accepter: &str, requester: &str) -> DbResult<RelationSummary> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let requester_nickname =
                nickname_of(&tx, requester)?.ok_or(DbError::UserNotFound)?;

            if edge_status(&tx, requester, accepter)? != Some(EdgeStatus::Request) {
                return Err(DbError::NoSuchRequest);
            }

            tx.execute(
                "UPDATE friends SET status = 'FRIEND'
                 WHERE owner_id = ?1 AND target_id = ?2",
                rusqlite::params![requester, accepter],
            )?;

            let updated = tx.execute(
                "UPDATE friends SET status = 'FRIEND'
                 WHERE owner_id = ?1 AND target_id = ?2",
                rusqlite::params![accepter, requester],
            )?;
            if updated == 0 {
                tx.execute(
                    "INSERT INTO friends (owner_id, target_id, status, created_at)
                     VALUES (?1, ?2, 'FRIEND', ?3)",
                    rusqlite::params![accepter, requester, fmt_ts(Utc::now())],
                )?;
            }

            tx.commit()?;
            Ok(RelationSummary {
                id: requester.into(),
                nickname: requester_nickname,
                status: RelationView::Friend,
            })
        })
    }

    /// Delete the single REQUEST edge `owner -> target`. Withdrawal when the
    /// caller is the owner, decline when the caller is the target.
    pub fn delete_request(&self, owner: &str, target: &str) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM friends
                 WHERE owner_id = ?1 AND target_id = ?2 AND status = 'REQUEST'",
                rusqlite::params![owner, target],
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    /// Delete a REQUEST edge by row id. The edge must belong to `caller`.
    pub fn withdraw_request_by_id(&self, caller: &str, edge_id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row: Option<(String, String)> = tx
                .query_row(
                    "SELECT owner_id, status FROM friends WHERE id = ?1",
                    [edge_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (owner, status) = row.ok_or(DbError::NotFound)?;
            if parse_status(&status)? != EdgeStatus::Request {
                return Err(DbError::NotFound);
            }
            if owner != caller {
                return Err(DbError::Forbidden);
            }

            tx.execute("DELETE FROM friends WHERE id = ?1", [edge_id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Tear down a friendship symmetrically: both FRIEND edges go in one
    /// transaction, never leaving a dangling one-sided edge.
    pub fn unfriend(&self, caller: &str, friend: &str) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let deleted = tx.execute(
                "DELETE FROM friends
                 WHERE owner_id = ?1 AND target_id = ?2 AND status = 'FRIEND'",
                rusqlite::params![caller, friend],
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound);
            }

            tx.execute(
                "DELETE FROM friends
                 WHERE owner_id = ?1 AND target_id = ?2 AND status = 'FRIEND'",
                rusqlite::params![friend, caller],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_friends(&self, user: &str) -> DbResult<Vec<RelationSummary>> {
        self.with_conn(|conn| list_edges(conn, user, EdgeStatus::Friend, true))
    }

    pub fn list_outgoing_requests(&self, user: &str) -> DbResult<Vec<RelationSummary>> {
        self.with_conn(|conn| list_edges(conn, user, EdgeStatus::Request, true))
    }

    pub fn list_incoming_requests(&self, user: &str) -> DbResult<Vec<RelationSummary>> {
        self.with_conn(|conn| list_edges(conn, user, EdgeStatus::Request, false))
    }

    /// Resolve `handle` (nickname first, then account id) and report the
    /// caller's relationship to that account. Read-only: the derived
    /// `NotYet`/`You` values are synthesized here, never stored.
    pub fn relation_to(&self, caller: &str, handle: &str) -> DbResult<RelationSummary> {
        self.with_conn(|conn| {
            let row = match query_user(conn, "nickname", handle)? {
                Some(row) => row,
                None => query_user(conn, "id", handle)?.ok_or(DbError::UserNotFound)?,
            };

            if row.id == caller {
                return Ok(RelationSummary {
                    id: row.id,
                    nickname: row.nickname,
                    status: RelationView::You,
                });
            }

            // The other account's edge toward the caller: a pending incoming
            // request shows up as REQUEST from the caller's point of view.
            let status = match edge_status(conn, &row.id, caller)? {
                Some(status) => status.into(),
                None => RelationView::NotYet,
            };

            Ok(RelationSummary {
                id: row.id,
                nickname: row.nickname,
                status,
            })
        })
    }

    /// All stored edges between two accounts, either direction.
    pub fn edges_between(&self, a: &str, b: &str) -> DbResult<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, target_id, status FROM friends
                 WHERE (owner_id = ?1 AND target_id = ?2)
                    OR (owner_id = ?2 AND target_id = ?1)",
            )?;

            let rows = stmt
                .query_map([a, b], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, owner_id, target_id, status)| {
                    Ok(FriendRow {
                        id,
                        owner_id,
                        target_id,
                        status: parse_status(&status)?,
                    })
                })
                .collect()
        })
    }
}

fn edge_status(conn: &Connection, owner: &str, target: &str) -> DbResult<Option<EdgeStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM friends WHERE owner_id = ?1 AND target_id = ?2",
            [owner, target],
            |row| row.get(0),
        )
        .optional()?;

    status.as_deref().map(parse_status).transpose()
}

fn nickname_of(conn: &Connection, id: &str) -> DbResult<Option<String>> {
    let nickname = conn
        .query_row("SELECT nickname FROM users WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(nickname)
}

fn promote_pair(conn: &Connection, a: &str, b: &str) -> DbResult<()> {
    conn.execute(
        "UPDATE friends SET status = 'FRIEND'
         WHERE (owner_id = ?1 AND target_id = ?2)
            OR (owner_id = ?2 AND target_id = ?1)",
        [a, b],
    )?;
    Ok(())
}

fn list_edges(
    conn: &Connection,
    user: &str,
    status: EdgeStatus,
    outgoing: bool,
) -> DbResult<Vec<RelationSummary>> {
    // Outgoing lists show the edge's target, incoming lists its owner.
    let sql = if outgoing {
        "SELECT f.target_id, u.nickname FROM friends f
         JOIN users u ON f.target_id = u.id
         WHERE f.owner_id = ?1 AND f.status = ?2
         ORDER BY f.created_at"
    } else {
        "SELECT f.owner_id, u.nickname FROM friends f
         JOIN users u ON f.owner_id = u.id
         WHERE f.target_id = ?1 AND f.status = ?2
         ORDER BY f.created_at"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user, status.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, nickname)| RelationSummary {
            id,
            nickname,
            status: status.into(),
        })
        .collect())
}

fn parse_status(s: &str) -> DbResult<EdgeStatus> {
    s.parse()
        .map_err(|_| DbError::Unavailable(format!("corrupt edge status '{s}'")))
}

fn map_friend_constraint(e: rusqlite::Error) -> DbError {
    match constraint_message(&e) {
        Some(msg) if msg.contains("friends.owner_id") => DbError::DuplicateRequest,
        Some(msg) if msg.contains("FOREIGN KEY") => DbError::UserNotFound,
        _ => e.into(),
    }
}
