//! Account persistence: schema bring-up, credential storage, upsert by
//! email.

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use campus_core::{AccountDraft, AccountId, AccountView, ScheduleProfile};

use crate::bind::{Params, SqlValue};
use crate::credentials;
use crate::database::Database;
use crate::driver::Row;
use crate::error::StoreError;
use crate::schema;

/// Everything the login flow needs: the caller-facing view plus the raw
/// credential pair. Only the login path should ever see this.
#[derive(Clone, Debug)]
pub struct AccountAuth {
    pub account: AccountView,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
}

pub struct AccountRepo {
    db: Database,
}

impl AccountRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the `accounts` table and additively migrate in the credential
    /// columns. Runs once per session; safe to call from every operation.
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.db.run_once("accounts", || {
            self.db.execute(schema::PRAGMAS, &Params::none())?;
            self.db.execute(schema::ACCOUNTS_TABLE, &Params::none())?;

            let columns = self
                .db
                .query("PRAGMA table_info(accounts);", &Params::none())?;
            let present: Vec<&str> = columns
                .iter()
                .filter_map(|row| row.get("name").and_then(Value::as_str))
                .collect();
            for (column, ddl) in schema::ACCOUNTS_CREDENTIAL_COLUMNS {
                if !present.contains(column) {
                    self.db.execute(ddl, &Params::none())?;
                }
            }
            Ok(())
        })
    }

    /// Insert-or-update by normalized email. Every mutable field and the
    /// credential pair are refreshed; the public id and creation time
    /// survive updates. Returns the row as stored.
    #[instrument(skip(self, draft), fields(email = %draft.email))]
    pub fn save(&self, draft: &AccountDraft) -> Result<AccountView, StoreError> {
        self.ensure_schema()?;

        let email = draft.email.trim().to_lowercase();
        let full_name = draft.full_name.trim().to_string();
        let group_label = draft.group_label.trim().to_string();
        let course = draft.course.trim().to_string();
        let record = credentials::create_password_record(draft.password.expose())?;
        let (profile_id, profile_kind, profile_label) =
            profile_params(draft.schedule_profile.as_ref());
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = self.get_by_email(&email)? {
            self.db.execute(
                "UPDATE accounts SET
                     full_name = :fullName,
                     course = :course,
                     group_label = :groupLabel,
                     university_id = :universityId,
                     university_title = :universityTitle,
                     schedule_profile_id = :scheduleProfileId,
                     schedule_profile_type = :scheduleProfileType,
                     schedule_profile_label = :scheduleProfileLabel,
                     password_hash = :passwordHash,
                     password_salt = :passwordSalt,
                     updated_at = :updatedAt
                 WHERE public_id = :publicId;",
                &Params::named([
                    ("publicId", SqlValue::from(existing.id.as_str())),
                    ("fullName", SqlValue::from(full_name)),
                    ("course", SqlValue::from(course)),
                    ("groupLabel", SqlValue::from(group_label)),
                    ("universityId", SqlValue::from(draft.university_id.as_str())),
                    (
                        "universityTitle",
                        SqlValue::from(draft.university_title.as_str()),
                    ),
                    ("scheduleProfileId", profile_id),
                    ("scheduleProfileType", profile_kind),
                    ("scheduleProfileLabel", profile_label),
                    ("passwordHash", SqlValue::from(record.hash)),
                    ("passwordSalt", SqlValue::from(record.salt)),
                    ("updatedAt", SqlValue::from(now)),
                ]),
            )?;
            return self.get_by_public_id(&existing.id)?.ok_or_else(|| {
                StoreError::Database(format!("account {} missing after update", existing.id))
            });
        }

        let public_id = AccountId::new();
        self.db.execute(
            "INSERT INTO accounts (
                 public_id, full_name, email, university_id, university_title,
                 course, group_label,
                 schedule_profile_id, schedule_profile_type, schedule_profile_label,
                 password_hash, password_salt, created_at, updated_at
             ) VALUES (
                 :publicId, :fullName, :email, :universityId, :universityTitle,
                 :course, :groupLabel,
                 :scheduleProfileId, :scheduleProfileType, :scheduleProfileLabel,
                 :passwordHash, :passwordSalt, :createdAt, :updatedAt
             );",
            &Params::named([
                ("publicId", SqlValue::from(public_id.as_str())),
                ("fullName", SqlValue::from(full_name)),
                ("email", SqlValue::from(email)),
                ("universityId", SqlValue::from(draft.university_id.as_str())),
                (
                    "universityTitle",
                    SqlValue::from(draft.university_title.as_str()),
                ),
                ("course", SqlValue::from(course)),
                ("groupLabel", SqlValue::from(group_label)),
                ("scheduleProfileId", profile_id),
                ("scheduleProfileType", profile_kind),
                ("scheduleProfileLabel", profile_label),
                ("passwordHash", SqlValue::from(record.hash)),
                ("passwordSalt", SqlValue::from(record.salt)),
                ("createdAt", SqlValue::from(now.as_str())),
                ("updatedAt", SqlValue::from(now.as_str())),
            ]),
        )?;
        self.get_by_public_id(&public_id)?.ok_or_else(|| {
            StoreError::Database(format!("account {public_id} missing after insert"))
        })
    }

    /// Single-row lookup by email, case-insensitive.
    #[instrument(skip(self, email))]
    pub fn get_by_email(&self, email: &str) -> Result<Option<AccountView>, StoreError> {
        self.ensure_schema()?;
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }
        let rows = self.db.query(
            "SELECT * FROM accounts WHERE email = :email LIMIT 1;",
            &Params::named([("email", SqlValue::from(email))]),
        )?;
        rows.first().map(view_from_row).transpose()
    }

    /// Single-row lookup by the externally visible id.
    #[instrument(skip(self), fields(public_id = %id))]
    pub fn get_by_public_id(&self, id: &AccountId) -> Result<Option<AccountView>, StoreError> {
        self.ensure_schema()?;
        if id.as_str().is_empty() {
            return Ok(None);
        }
        let rows = self.db.query(
            "SELECT * FROM accounts WHERE public_id = :publicId LIMIT 1;",
            &Params::named([("publicId", SqlValue::from(id.as_str()))]),
        )?;
        rows.first().map(view_from_row).transpose()
    }

    /// Lookup for the login flow: the view plus the raw credential pair.
    /// Callers decide how much of the "not found" vs "bad password"
    /// distinction to disclose.
    #[instrument(skip(self, email))]
    pub fn get_auth_by_email(&self, email: &str) -> Result<Option<AccountAuth>, StoreError> {
        self.ensure_schema()?;
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }
        let rows = self.db.query(
            "SELECT * FROM accounts WHERE email = :email LIMIT 1;",
            &Params::named([("email", SqlValue::from(email))]),
        )?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(AccountAuth {
            account: view_from_row(row)?,
            password_hash: opt_text(row, "password_hash"),
            password_salt: opt_text(row, "password_salt"),
        }))
    }
}

fn profile_params(profile: Option<&ScheduleProfile>) -> (SqlValue, SqlValue, SqlValue) {
    match profile {
        Some(p) => (
            SqlValue::from(p.id.as_str()),
            SqlValue::from(p.kind.as_str()),
            SqlValue::from(p.label.as_str()),
        ),
        None => (SqlValue::Null, SqlValue::Null, SqlValue::Null),
    }
}

fn text(row: &Row, column: &'static str) -> Result<String, StoreError> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        other => Err(StoreError::CorruptRow {
            table: "accounts",
            column,
            detail: format!("expected text, got {other:?}"),
        }),
    }
}

fn opt_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn view_from_row(row: &Row) -> Result<AccountView, StoreError> {
    let group_label = text(row, "group_label")?;
    let schedule_profile = opt_text(row, "schedule_profile_id").map(|id| ScheduleProfile {
        id,
        kind: opt_text(row, "schedule_profile_type").unwrap_or_default(),
        label: opt_text(row, "schedule_profile_label").unwrap_or_else(|| group_label.clone()),
    });
    Ok(AccountView {
        id: AccountId::from_raw(text(row, "public_id")?),
        full_name: text(row, "full_name")?,
        email: text(row, "email")?,
        university_id: text(row, "university_id")?,
        university_title: text(row, "university_title")?,
        course: text(row, "course")?,
        group_label,
        schedule_profile,
        created_at: text(row, "created_at")?,
        updated_at: text(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::credentials::verify_password;

    fn repo() -> AccountRepo {
        let dir =
            std::env::temp_dir().join(format!("campus-accounts-test-{}", uuid::Uuid::now_v7()));
        AccountRepo::new(Database::new(StoreConfig {
            db_path: Some(dir.join("accounts.db")),
            force_embedded: true,
            ..StoreConfig::default()
        }))
    }

    fn draft(email: &str, full_name: &str, password: &str) -> AccountDraft {
        AccountDraft {
            full_name: full_name.into(),
            email: email.into(),
            course: "2".into(),
            group_label: "CS-21".into(),
            university_id: "uni-1".into(),
            university_title: "Example University".into(),
            schedule_profile: None,
            password: password.into(),
        }
    }

    #[test]
    fn register_creates_account() {
        let repo = repo();
        let view = repo.save(&draft("ada@example.edu", "Ada Lovelace", "secret1")).unwrap();
        assert!(view.id.as_str().starts_with("acct_"), "got: {}", view.id);
        assert_eq!(view.email, "ada@example.edu");
        assert_eq!(view.full_name, "Ada Lovelace");
        assert_eq!(view.created_at, view.updated_at);
        assert!(view.schedule_profile.is_none());
    }

    #[test]
    fn reregistering_same_email_updates_in_place() {
        let repo = repo();
        let first = repo.save(&draft("ada@example.edu", "Ada L.", "secret1")).unwrap();
        let second = repo.save(&draft("ada@example.edu", "Ada Lovelace", "secret2")).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.full_name, "Ada Lovelace");

        let fetched = repo.get_by_email("ada@example.edu").unwrap().unwrap();
        assert_eq!(fetched.full_name, "Ada Lovelace");
        assert_eq!(fetched.id, first.id);
    }

    #[test]
    fn email_is_normalized() {
        let repo = repo();
        let view = repo.save(&draft("  Ada@Example.EDU ", "Ada Lovelace", "secret1")).unwrap();
        assert_eq!(view.email, "ada@example.edu");
        assert!(repo.get_by_email("ADA@EXAMPLE.edu").unwrap().is_some());
    }

    #[test]
    fn names_and_labels_are_trimmed() {
        let repo = repo();
        let mut d = draft("ada@example.edu", "  Ada Lovelace  ", "secret1");
        d.group_label = " CS-21 ".into();
        d.course = " 2 ".into();
        let view = repo.save(&d).unwrap();
        assert_eq!(view.full_name, "Ada Lovelace");
        assert_eq!(view.group_label, "CS-21");
        assert_eq!(view.course, "2");
    }

    #[test]
    fn schedule_profile_roundtrip() {
        let repo = repo();
        let mut d = draft("ada@example.edu", "Ada Lovelace", "secret1");
        d.schedule_profile = Some(ScheduleProfile {
            id: "grp-42".into(),
            kind: "group".into(),
            label: "CS-21 (day)".into(),
        });
        let view = repo.save(&d).unwrap();
        let profile = view.schedule_profile.unwrap();
        assert_eq!(profile.id, "grp-42");
        assert_eq!(profile.kind, "group");
        assert_eq!(profile.label, "CS-21 (day)");
    }

    #[test]
    fn empty_profile_label_falls_back_to_group() {
        let repo = repo();
        let mut d = draft("ada@example.edu", "Ada Lovelace", "secret1");
        d.schedule_profile = Some(ScheduleProfile {
            id: "grp-42".into(),
            kind: "group".into(),
            label: "".into(),
        });
        let view = repo.save(&d).unwrap();
        assert_eq!(view.schedule_profile.unwrap().label, "CS-21");
    }

    #[test]
    fn lookup_by_public_id() {
        let repo = repo();
        let view = repo.save(&draft("ada@example.edu", "Ada Lovelace", "secret1")).unwrap();
        let fetched = repo.get_by_public_id(&view.id).unwrap().unwrap();
        assert_eq!(fetched, view);
        assert!(repo
            .get_by_public_id(&AccountId::from_raw("acct_nonexistent"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_email_is_absent() {
        let repo = repo();
        assert!(repo.get_by_email("nobody@example.edu").unwrap().is_none());
        assert!(repo.get_auth_by_email("nobody@example.edu").unwrap().is_none());
        assert!(repo.get_by_email("").unwrap().is_none());
    }

    #[test]
    fn empty_password_is_rejected() {
        let repo = repo();
        let err = repo.save(&draft("ada@example.edu", "Ada Lovelace", "")).unwrap_err();
        assert!(matches!(err, StoreError::Credential(_)), "got: {err:?}");
        assert!(repo.get_by_email("ada@example.edu").unwrap().is_none());
    }

    #[test]
    fn register_then_login_flow() {
        let repo = repo();
        let registered = repo.save(&draft("a@x.com", "Grace Hopper", "secret1")).unwrap();

        // Known email, right password.
        let auth = repo.get_auth_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(auth.account.id, registered.id);
        assert!(verify_password(
            "secret1",
            auth.password_hash.as_deref(),
            auth.password_salt.as_deref()
        ));

        // Known email, wrong password.
        assert!(!verify_password(
            "wrong",
            auth.password_hash.as_deref(),
            auth.password_salt.as_deref()
        ));

        // Unknown email is a distinct outcome: no auth record at all.
        assert!(repo.get_auth_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn reregistration_rotates_credentials() {
        let repo = repo();
        repo.save(&draft("a@x.com", "Grace Hopper", "old-password")).unwrap();
        repo.save(&draft("a@x.com", "Grace Hopper", "new-password")).unwrap();

        let auth = repo.get_auth_by_email("a@x.com").unwrap().unwrap();
        assert!(!verify_password(
            "old-password",
            auth.password_hash.as_deref(),
            auth.password_salt.as_deref()
        ));
        assert!(verify_password(
            "new-password",
            auth.password_hash.as_deref(),
            auth.password_salt.as_deref()
        ));
    }

    #[test]
    fn older_schema_gains_credential_columns() {
        let dir =
            std::env::temp_dir().join(format!("campus-accounts-test-{}", uuid::Uuid::now_v7()));
        let db = Database::new(StoreConfig {
            db_path: Some(dir.join("accounts.db")),
            force_embedded: true,
            ..StoreConfig::default()
        });
        // A database file created before credentials existed.
        db.execute(
            "CREATE TABLE accounts (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 public_id TEXT NOT NULL UNIQUE,
                 full_name TEXT NOT NULL,
                 email TEXT NOT NULL UNIQUE,
                 university_id TEXT NOT NULL,
                 university_title TEXT NOT NULL,
                 course TEXT NOT NULL,
                 group_label TEXT NOT NULL,
                 schedule_profile_id TEXT,
                 schedule_profile_type TEXT,
                 schedule_profile_label TEXT,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
            &Params::none(),
        )
        .unwrap();

        let repo = AccountRepo::new(db);
        let view = repo.save(&draft("ada@example.edu", "Ada Lovelace", "secret1")).unwrap();
        let auth = repo.get_auth_by_email("ada@example.edu").unwrap().unwrap();
        assert_eq!(auth.account.id, view.id);
        assert!(auth.password_hash.is_some());
        assert!(auth.password_salt.is_some());
    }
}
