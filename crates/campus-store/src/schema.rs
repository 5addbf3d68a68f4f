//! SQL DDL for the campus store.

/// Session pragmas. WAL lets the portal's readers proceed while one writer
/// is active.
pub const PRAGMAS: &str = "\
PRAGMA journal_mode=WAL;
PRAGMA busy_timeout=5000;
PRAGMA synchronous=NORMAL;
";

/// `accounts`: one row per registered user. `public_id` is the only id
/// that leaves the process; `id` stays internal.
pub const ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
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
);

CREATE INDEX IF NOT EXISTS idx_accounts_email ON accounts(email);
CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_public_id ON accounts(public_id);
"#;

/// Columns added after the first release. Probed via `PRAGMA table_info`
/// and added one by one so older database files migrate in place; columns
/// are never dropped or renamed.
pub const ACCOUNTS_CREDENTIAL_COLUMNS: &[(&str, &str)] = &[
    (
        "password_hash",
        "ALTER TABLE accounts ADD COLUMN password_hash TEXT;",
    ),
    (
        "password_salt",
        "ALTER TABLE accounts ADD COLUMN password_salt TEXT;",
    ),
];

/// `projects`: opaque JSON documents keyed by id. The caller owns the
/// document shape entirely.
pub const PROJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_updated ON projects(updated_at);
"#;
