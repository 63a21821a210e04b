//! SQLite-backed store.
//!
//! Uniqueness of username, email and student id is enforced by unique
//! indexes, so a registration that races past the service-level check still
//! fails with the right `Duplicate*` error. Token consumption is a single
//! conditional `UPDATE`.
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concern_common::IssueStatus;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{sort_issues, PasswordChange, Store};
use crate::error::AppError;
use crate::models::{
    IssueFilter, IssueRecord, Profile, ProfileUpdate, TokenPurpose, TokenRecord, UserLookup,
    UserRecord,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('student', 'subadmin', 'supaadmin')),
    email TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    email_verified INTEGER NOT NULL DEFAULT 0,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    gender TEXT NOT NULL DEFAULT '',
    student_id TEXT NOT NULL DEFAULT '' COLLATE NOCASE,
    level TEXT NOT NULL DEFAULT '',
    department TEXT NOT NULL DEFAULT '',
    program TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    password_reset_at TEXT,
    verified_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE email <> '';
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_student_id ON users(student_id) WHERE student_id <> '';

CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    value TEXT NOT NULL,
    purpose TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    used INTEGER NOT NULL DEFAULT 0,
    used_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_tokens_value ON tokens(value, purpose);

CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    category TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'resolved', 'deleted')),
    response TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_issues_student ON issues(student_id);
";

const USER_COLUMNS: &str = "id, username, password_hash, role, email, email_verified, \
     first_name, last_name, phone, gender, student_id, level, department, program, \
     created_at, updated_at, password_reset_at, verified_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, value, purpose, created_at, expires_at, used, used_at";

const ISSUE_COLUMNS: &str =
    "id, student_id, subject, category, message, status, response, created_at, updated_at";

/// SQLite implementation of the Store trait.
///
/// Queries run inline on the calling task; the connection is serialized by
/// the mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and apply the schema
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(3)?;
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: role.parse().map_err(|e| conversion_error(3, e))?,
        email: row.get(4)?,
        email_verified: row.get(5)?,
        profile: Profile {
            first_name: row.get(6)?,
            last_name: row.get(7)?,
            phone: row.get(8)?,
            gender: row.get(9)?,
            student_id: row.get(10)?,
            level: row.get(11)?,
            department: row.get(12)?,
            program: row.get(13)?,
        },
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        password_reset_at: row.get(16)?,
        verified_at: row.get(17)?,
    })
}

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<TokenRecord> {
    let purpose: String = row.get(3)?;
    Ok(TokenRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        value: row.get(2)?,
        purpose: TokenPurpose::parse(&purpose)
            .ok_or_else(|| conversion_error(3, format!("unknown token purpose: {purpose}")))?,
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
        used: row.get(6)?,
        used_at: row.get(7)?,
    })
}

fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<IssueRecord> {
    let status: String = row.get(5)?;
    Ok(IssueRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject: row.get(2)?,
        category: row.get(3)?,
        message: row.get(4)?,
        status: status.parse().map_err(|e| conversion_error(5, e))?,
        response: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Map a unique-index violation on `users` to the matching domain error
fn map_user_insert_error(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return AppError::DuplicateUsername;
            }
            if msg.contains("users.student_id") {
                return AppError::DuplicateStudentId;
            }
            if msg.contains("users.email") {
                return AppError::DuplicateEmail;
            }
        }
    }
    AppError::from(err)
}

#[async_trait]
impl Store for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<UserRecord>, AppError> {
        let (clause, value) = match lookup {
            UserLookup::Id(id) => ("id = ?1", id),
            UserLookup::Username(name) => ("username = ?1", name.trim()),
            UserLookup::Email(email) => ("email = ?1 AND email <> ''", email.trim()),
            UserLookup::StudentId(sid) => ("student_id = ?1 AND student_id <> ''", sid.trim()),
            UserLookup::Phone(phone) => ("phone = ?1 AND phone <> ''", phone.trim()),
        };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} LIMIT 1");
        let conn = self.conn.lock();
        let user = conn
            .query_row(&sql, params![value], row_to_user)
            .optional()?;
        Ok(user)
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            params![
                user.id,
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.email,
                user.email_verified,
                user.profile.first_name,
                user.profile.last_name,
                user.profile.phone,
                user.profile.gender,
                user.profile.student_id,
                user.profile.level,
                user.profile.department,
                user.profile.program,
                user.created_at,
                user.updated_at,
                user.password_reset_at,
                user.verified_at,
            ],
        )
        .map_err(map_user_insert_error)?;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        change: PasswordChange,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let sql = match change {
            PasswordChange::Changed => {
                "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3"
            },
            PasswordChange::Reset => {
                "UPDATE users SET password_hash = ?1, updated_at = ?2, password_reset_at = ?2 \
                 WHERE id = ?3"
            },
        };
        let changed = self
            .conn
            .lock()
            .execute(sql, params![password_hash, at, user_id])?;
        Ok(changed == 1)
    }

    async fn mark_email_verified(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let changed = self.conn.lock().execute(
            "UPDATE users SET email_verified = 1, verified_at = ?1 WHERE id = ?2",
            params![at, user_id],
        )?;
        Ok(changed == 1)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let changed = self.conn.lock().execute(
            "UPDATE users SET \
                first_name = COALESCE(?1, first_name), \
                last_name = COALESCE(?2, last_name), \
                phone = COALESCE(?3, phone), \
                level = COALESCE(?4, level), \
                department = COALESCE(?5, department), \
                program = COALESCE(?6, program), \
                updated_at = ?7 \
             WHERE id = ?8",
            params![
                update.first_name,
                update.last_name,
                update.phone,
                update.level,
                update.department,
                update.program,
                at,
                user_id,
            ],
        )?;
        Ok(changed == 1)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<(), AppError> {
        self.conn.lock().execute(
            &format!(
                "INSERT INTO tokens ({TOKEN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                token.id,
                token.user_id,
                token.value,
                token.purpose.as_str(),
                token.created_at,
                token.expires_at,
                token.used,
                token.used_at,
            ],
        )?;
        Ok(())
    }

    async fn find_tokens(
        &self,
        value: &str,
        purpose: TokenPurpose,
    ) -> Result<Vec<TokenRecord>, AppError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE value = ?1 AND purpose = ?2"
        ))?;
        let tokens = stmt
            .query_map(params![value, purpose.as_str()], row_to_token)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tokens)
    }

    async fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let changed = self.conn.lock().execute(
            "UPDATE tokens SET used = 1, used_at = ?1 WHERE id = ?2 AND used = 0",
            params![at, token_id],
        )?;
        Ok(changed == 1)
    }

    async fn insert_issue(&self, issue: &IssueRecord) -> Result<(), AppError> {
        self.conn.lock().execute(
            &format!(
                "INSERT INTO issues ({ISSUE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                issue.id,
                issue.student_id,
                issue.subject,
                issue.category,
                issue.message,
                issue.status.as_str(),
                issue.response,
                issue.created_at,
                issue.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn get_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, AppError> {
        let issue = self
            .conn
            .lock()
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
                params![issue_id],
                row_to_issue,
            )
            .optional()?;
        Ok(issue)
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, AppError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if !filter.include_deleted {
            clauses.push("status <> 'deleted'".to_string());
        }
        if let Some(student_id) = &filter.student_id {
            values.push(student_id.clone());
            clauses.push(format!("student_id = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut issues = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), row_to_issue)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        sort_issues(&mut issues);
        Ok(issues)
    }

    async fn update_issue_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        response: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let changed = self.conn.lock().execute(
            "UPDATE issues SET status = ?1, response = COALESCE(?2, response), updated_at = ?3 \
             WHERE id = ?4",
            params![status.as_str(), response, at, issue_id],
        )?;
        Ok(changed == 1)
    }
}
