//! The storage session: path provisioning, driver selection and the two
//! statement primitives every repository is built on.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::bind::{self, Params};
use crate::config::StoreConfig;
use crate::driver::{
    embedded_execute, embedded_query, open_embedded, parse_rows, probe, ExternalDriver,
    ExternalError, Probe, Row,
};
use crate::error::StoreError;
use crate::paths::StoragePaths;

/// Which execution strategy the session settled on. Transitions are forward
/// only: once `Embedded` is reached the external engine is never retried
/// within the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Unresolved,
    External,
    Embedded,
}

enum Driver {
    Unresolved,
    External(ExternalDriver),
    Embedded(rusqlite::Connection),
}

impl Driver {
    fn state(&self) -> DriverState {
        match self {
            Self::Unresolved => DriverState::Unresolved,
            Self::External(_) => DriverState::External,
            Self::Embedded(_) => DriverState::Embedded,
        }
    }
}

struct State {
    paths: StoragePaths,
    driver: Driver,
}

struct Shared {
    config: StoreConfig,
    state: Mutex<State>,
    init_done: Mutex<BTreeSet<&'static str>>,
}

/// One storage session per process. Constructed once and handed to every
/// repository (clones share the same state through an `Arc`); nothing in
/// this module is a global. All mutable state (the provisioned path, the
/// chosen driver, the lazily opened embedded handle) lives behind the
/// internal mutex, which also serves as the one-shot initialization gate
/// for multi-threaded hosts.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    /// Build a session from explicit configuration. No I/O happens until
    /// the first statement runs.
    pub fn new(config: StoreConfig) -> Self {
        let state = State {
            paths: StoragePaths::new(&config),
            driver: Driver::Unresolved,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                init_done: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// Build a session from the `CAMPUS_*` environment surface.
    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    /// Run a statement that produces no rows.
    pub fn execute(&self, sql: &str, params: &Params) -> Result<(), StoreError> {
        let rendered = bind::render(sql, params)?;
        let sql = rendered.trim();
        let mut state = self.shared.state.lock();
        let path = state.paths.ensure()?;
        loop {
            let outcome = match &state.driver {
                Driver::Unresolved => None,
                Driver::Embedded(conn) => return embedded_execute(conn, sql),
                Driver::External(external) => Some(external.execute(&path, sql)),
            };
            match outcome {
                None => state.driver = select_driver(&self.shared.config, &path)?,
                Some(Ok(())) => return Ok(()),
                Some(Err(ExternalError::Vanished)) => demote(&mut state.driver, &path)?,
                Some(Err(ExternalError::Failed(message))) => {
                    return Err(StoreError::Driver(message))
                }
            }
        }
    }

    /// Run a statement and collect its rows as field → value records.
    pub fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, StoreError> {
        let rendered = bind::render(sql, params)?;
        let sql = rendered.trim();
        let mut state = self.shared.state.lock();
        let path = state.paths.ensure()?;
        loop {
            let outcome = match &state.driver {
                Driver::Unresolved => None,
                Driver::Embedded(conn) => return embedded_query(conn, sql),
                Driver::External(external) => Some(external.query(&path, sql)),
            };
            match outcome {
                None => state.driver = select_driver(&self.shared.config, &path)?,
                Some(Ok(output)) => return parse_rows(&output),
                Some(Err(ExternalError::Vanished)) => demote(&mut state.driver, &path)?,
                Some(Err(ExternalError::Failed(message))) => {
                    return Err(StoreError::Driver(message))
                }
            }
        }
    }

    /// Which driver the session is on.
    pub fn driver_state(&self) -> DriverState {
        self.shared.state.lock().driver.state()
    }

    /// Path statements actually target. `None` until the first statement ran.
    pub fn effective_path(&self) -> Option<PathBuf> {
        self.shared.state.lock().paths.active().map(Path::to_path_buf)
    }

    /// One-shot initialization gate: `f` runs the first time `key` is seen
    /// and never again for this session. The gate is held for the duration
    /// of `f`, so concurrent first calls cannot interleave schema bring-up.
    pub(crate) fn run_once(
        &self,
        key: &'static str,
        f: impl FnOnce() -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut done = self.shared.init_done.lock();
        if done.contains(key) {
            return Ok(());
        }
        f()?;
        done.insert(key);
        Ok(())
    }
}

fn select_driver(config: &StoreConfig, path: &Path) -> Result<Driver, StoreError> {
    if config.force_embedded {
        info!("embedded engine forced by configuration");
        return Ok(Driver::Embedded(open_embedded(path)?));
    }
    match probe(&config.sqlite_bin)? {
        Probe::External => Ok(Driver::External(ExternalDriver::new(
            config.sqlite_bin.clone(),
        ))),
        Probe::Missing => Ok(Driver::Embedded(open_embedded(path)?)),
    }
}

fn demote(driver: &mut Driver, path: &Path) -> Result<(), StoreError> {
    warn!("external sql engine disappeared mid-call; switching to embedded engine");
    *driver = Driver::Embedded(open_embedded(path)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::SqlValue;

    fn scratch_db() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("campus-db-test-{}", uuid::Uuid::now_v7()));
        dir.join("store.db")
    }

    fn embedded_db() -> Database {
        Database::new(StoreConfig {
            db_path: Some(scratch_db()),
            force_embedded: true,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn starts_unresolved_with_no_side_effects() {
        let db = embedded_db();
        assert_eq!(db.driver_state(), DriverState::Unresolved);
        assert!(db.effective_path().is_none());
    }

    #[test]
    fn force_embedded_skips_probe() {
        let db = embedded_db();
        db.execute("CREATE TABLE t (a TEXT)", &Params::none()).unwrap();
        assert_eq!(db.driver_state(), DriverState::Embedded);
        assert!(db.effective_path().is_some());
    }

    #[test]
    fn missing_binary_falls_back_and_sticks() {
        let db = Database::new(StoreConfig {
            db_path: Some(scratch_db()),
            sqlite_bin: format!("campus-no-such-engine-{}", uuid::Uuid::now_v7()),
            ..StoreConfig::default()
        });
        db.execute("CREATE TABLE t (a TEXT)", &Params::none()).unwrap();
        assert_eq!(db.driver_state(), DriverState::Embedded);

        // Subsequent statements run without re-probing: the second call
        // would fail loudly if it went back to the nonexistent binary.
        db.execute("INSERT INTO t VALUES ('x')", &Params::none()).unwrap();
        let rows = db.query("SELECT COUNT(*) AS n FROM t", &Params::none()).unwrap();
        assert_eq!(rows[0]["n"], 1);
        assert_eq!(db.driver_state(), DriverState::Embedded);
    }

    #[test]
    fn execute_and_query_roundtrip() {
        let db = embedded_db();
        db.execute(
            "CREATE TABLE people (name TEXT, age INTEGER)",
            &Params::none(),
        )
        .unwrap();
        db.execute(
            "INSERT INTO people (name, age) VALUES (?, ?)",
            &Params::positional([SqlValue::from("O'Brien"), SqlValue::from(30i64)]),
        )
        .unwrap();
        let rows = db
            .query(
                "SELECT name, age FROM people WHERE name = :name",
                &Params::named([("name", "O'Brien")]),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "O'Brien");
        assert_eq!(rows[0]["age"], 30);
    }

    #[test]
    fn parameter_shortfall_fails_before_any_io() {
        let db = embedded_db();
        let err = db
            .execute(
                "INSERT INTO t VALUES (?, ?)",
                &Params::positional(["just one"]),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParameter(_)), "got: {err:?}");
        // The statement never reached a driver: no path was provisioned.
        assert_eq!(db.driver_state(), DriverState::Unresolved);
        assert!(db.effective_path().is_none());
    }

    #[test]
    fn run_once_runs_exactly_once() {
        let db = embedded_db();
        let mut runs = 0;
        db.run_once("marker", || {
            runs += 1;
            Ok(())
        })
        .unwrap();
        db.run_once("marker", || {
            runs += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(runs, 1);
    }

    #[test]
    fn run_once_retries_after_failure() {
        let db = embedded_db();
        let err = db.run_once("flaky", || Err(StoreError::Database("boom".into())));
        assert!(err.is_err());
        let mut ran = false;
        db.run_once("flaky", || {
            ran = true;
            Ok(())
        })
        .unwrap();
        assert!(ran);
    }

    #[test]
    fn clones_share_state() {
        let db = embedded_db();
        let clone = db.clone();
        db.execute("CREATE TABLE t (a TEXT)", &Params::none()).unwrap();
        assert_eq!(clone.driver_state(), DriverState::Embedded);
        clone
            .execute("INSERT INTO t VALUES ('shared')", &Params::none())
            .unwrap();
        let rows = db.query("SELECT a FROM t", &Params::none()).unwrap();
        assert_eq!(rows[0]["a"], "shared");
    }
}
