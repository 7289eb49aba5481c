use crate::ast::Location;
use crate::detect::{Category, Finding, Severity, SeverityCounts};
use crate::errors::ArgusResult;
use crate::report::{FileAnalysis, FunctionFindings};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub type CachePool = Arc<Pool<SqliteConnectionManager>>;

/// Where a project's findings database lives.
#[derive(Debug, Clone)]
pub struct CacheLocation {
    pub project: String,
    pub db_path: PathBuf,
}

/// Map a scan root to its cache database. The file name pairs a readable
/// slug with a digest of the root path, so projects that share a directory
/// name cannot clobber each other's results.
pub fn locate(scan_root: &Path, data_dir: &Path) -> CacheLocation {
    let project = scan_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("root")
        .to_owned();
    let hex = blake3::hash(scan_root.to_string_lossy().as_bytes()).to_hex();
    let file = format!("{}-{}.sqlite", slug(&project), &hex[..8]);
    CacheLocation {
        project,
        db_path: data_dir.join(file),
    }
}

/// Lowercased, dash-separated form of a project name, safe as a file stem.
/// `cache clean <name>` matches databases by this prefix.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "project".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// DB schema (foreign-keys enabled). Findings are stored unfiltered; the
/// request filters re-apply on load.
const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS files (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        project     TEXT    NOT NULL,
        path        TEXT    NOT NULL,
        hash        BLOB    NOT NULL,
        mtime       INTEGER NOT NULL,
        analyzed_at INTEGER NOT NULL,
        UNIQUE(project, path)
    );

    CREATE TABLE IF NOT EXISTS functions (
        file_id    INTEGER NOT NULL
                          REFERENCES files(id)
                          ON DELETE CASCADE,
        name       TEXT    NOT NULL,
        line       INTEGER NOT NULL,
        col        INTEGER NOT NULL,
        complexity INTEGER NOT NULL,
        PRIMARY KEY (file_id, name)
    );

    CREATE TABLE IF NOT EXISTS findings (
        file_id    INTEGER NOT NULL
                          REFERENCES files(id)
                          ON DELETE CASCADE,
        function   TEXT    NOT NULL,
        category   TEXT    NOT NULL,
        severity   TEXT    NOT NULL,
        line       INTEGER NOT NULL,
        col        INTEGER NOT NULL,
        end_line   INTEGER NOT NULL,
        end_col    INTEGER NOT NULL,
        message    TEXT    NOT NULL,
        PRIMARY KEY (file_id, function, category, line, col)
    );
"#;

pub struct Cache {
    conn: PooledConnection<SqliteConnectionManager>,
    project: String,
}

impl Cache {
    pub fn init(database_path: &Path) -> ArgusResult<CachePool> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let manager = SqliteConnectionManager::file(database_path).with_flags(flags);
        let pool = Arc::new(Pool::new(manager)?);

        {
            let conn = pool.get()?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.execute_batch(SCHEMA)?;
        }
        Ok(pool)
    }

    pub fn from_pool(project: &str, pool: &Pool<SqliteConnectionManager>) -> ArgusResult<Self> {
        let conn = pool.get()?;
        Ok(Self {
            conn,
            project: project.to_owned(),
        })
    }

    // helper so code below can treat PooledConnection like &Connection
    fn c(&self) -> &Connection {
        self.conn.deref()
    }

    /// True when the file *content* or *mtime* changed since it was last
    /// analyzed.
    pub fn should_analyze(&self, path: &Path) -> ArgusResult<bool> {
        let meta = fs::metadata(path)?;
        let mtime = meta.modified()?.duration_since(UNIX_EPOCH)?.as_secs() as i64;
        let digest = Self::digest_file(path)?;

        let row: Option<(Vec<u8>, i64)> = self
            .conn
            .query_row(
                "SELECT hash, mtime FROM files WHERE project = ?1 AND path = ?2",
                params![self.project, path.to_string_lossy()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        Ok(match row {
            Some((stored_hash, stored_mtime)) => stored_hash != digest || stored_mtime != mtime,
            None => true,
        })
    }

    /// Insert or update the `files` row and return its id.
    pub fn upsert_file(&self, path: &Path) -> ArgusResult<i64> {
        let meta = fs::metadata(path)?;
        let mtime = meta.modified()?.duration_since(UNIX_EPOCH)?.as_secs() as i64;
        let analyzed_at = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
        let digest = Self::digest_file(path)?;

        self.c().execute(
            "INSERT INTO files (project, path, hash, mtime, analyzed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project,path) DO UPDATE
             SET hash = excluded.hash,
                 mtime = excluded.mtime,
                 analyzed_at = excluded.analyzed_at",
            params![
                self.project,
                path.to_string_lossy(),
                digest,
                mtime,
                analyzed_at
            ],
        )?;

        let id: i64 = self.c().query_row(
            "SELECT id FROM files WHERE project = ?1 AND path = ?2",
            params![self.project, path.to_string_lossy()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Replace everything stored for this file with the fresh analysis.
    pub fn store_analysis(&mut self, analysis: &FileAnalysis) -> ArgusResult<()> {
        let file_id = self.upsert_file(&analysis.path)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM functions WHERE file_id = ?", params![file_id])?;
        tx.execute("DELETE FROM findings WHERE file_id = ?", params![file_id])?;

        {
            let mut fn_stmt = tx.prepare(
                "INSERT INTO functions (file_id, name, line, col, complexity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut finding_stmt = tx.prepare(
                "INSERT INTO findings
                     (file_id, function, category, severity, line, col, end_line, end_col, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for func in &analysis.functions {
                fn_stmt.execute(params![
                    file_id,
                    func.name,
                    func.line as i64,
                    func.col as i64,
                    i64::from(func.complexity)
                ])?;
                for finding in &func.findings {
                    finding_stmt.execute(params![
                        file_id,
                        func.name,
                        finding.category.as_db_str(),
                        finding.severity.as_db_str(),
                        finding.loc.line as i64,
                        finding.loc.col as i64,
                        finding.loc.end_line as i64,
                        finding.loc.end_col as i64,
                        finding.message,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Reload the stored analysis for an unchanged file.
    pub fn load_analysis(&self, path: &Path) -> ArgusResult<Option<FileAnalysis>> {
        let file_id: Option<i64> = self
            .c()
            .query_row(
                "SELECT id FROM files WHERE project = ?1 AND path = ?2",
                params![self.project, path.to_string_lossy()],
                |r| r.get(0),
            )
            .optional()?;
        let Some(file_id) = file_id else {
            return Ok(None);
        };

        let mut stmt = self.c().prepare(
            "SELECT name, line, col, complexity
             FROM functions
             WHERE file_id = ?1
             ORDER BY line, col",
        )?;
        let mut functions: Vec<FunctionFindings> = stmt
            .query_map([file_id], |row| {
                Ok(FunctionFindings {
                    name: row.get(0)?,
                    line: row.get::<_, i64>(1)? as usize,
                    col: row.get::<_, i64>(2)? as usize,
                    complexity: row.get::<_, i64>(3)? as u32,
                    counts: SeverityCounts::default(),
                    findings: Vec::new(),
                })
            })?
            .collect::<Result<_, _>>()?;

        let mut stmt = self.c().prepare(
            "SELECT function, category, severity, line, col, end_line, end_col, message
             FROM findings
             WHERE file_id = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([file_id], |row| {
            let function: String = row.get(0)?;
            let category: String = row.get(1)?;
            let severity: String = row.get(2)?;
            Ok((
                function,
                category,
                severity,
                row.get::<_, i64>(3)? as usize,
                row.get::<_, i64>(4)? as usize,
                row.get::<_, i64>(5)? as usize,
                row.get::<_, i64>(6)? as usize,
                row.get::<_, String>(7)?,
            ))
        })?;
        for row in rows {
            let (function, category, severity, line, col, end_line, end_col, message) = row?;
            let Ok(category) = Category::from_str(&category) else {
                continue;
            };
            let severity = Severity::from_str(&severity).unwrap_or(Severity::Info);
            if let Some(func) = functions.iter_mut().find(|f| f.name == function) {
                func.findings.push(Finding {
                    category,
                    function,
                    loc: Location {
                        line,
                        col,
                        end_line,
                        end_col,
                    },
                    severity,
                    message,
                });
            }
        }
        for func in &mut functions {
            func.counts = SeverityCounts::tally(&func.findings);
        }

        Ok(Some(FileAnalysis {
            path: path.to_path_buf(),
            functions,
        }))
    }

    /// Cached file paths for this project.
    pub fn get_files(&self) -> ArgusResult<Vec<PathBuf>> {
        let mut stmt = self.c().prepare(
            "SELECT path
             FROM files
             WHERE project = ?1",
        )?;
        let file_iter = stmt.query_map([self.project.as_str()], |row| row.get::<_, String>(0))?;
        Ok(file_iter
            .map(|p| p.map(PathBuf::from))
            .collect::<Result<_, _>>()?)
    }

    // -------------------------------------------------------------------------
    // Maintenance utilities
    // -------------------------------------------------------------------------
    pub fn clear(&self) -> ArgusResult<()> {
        self.c().execute_batch(
            r#"
    PRAGMA foreign_keys = OFF;

    DROP TABLE IF EXISTS findings;
    DROP TABLE IF EXISTS functions;
    DROP TABLE IF EXISTS files;

    PRAGMA foreign_keys = ON;
    VACUUM;
    "#,
        )?;

        self.c().execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn vacuum(&self) -> ArgusResult<()> {
        self.c().execute("VACUUM;", [])?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------
    fn digest_file(path: &Path) -> ArgusResult<Vec<u8>> {
        let mut hasher = blake3::Hasher::new();
        let mut file = fs::File::open(path)?;
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hasher.finalize().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze_source;
    use crate::engine::CancelToken;

    #[test]
    fn slug_is_lowercase_and_dash_separated() {
        assert_eq!(slug("My App (v2)"), "my-app-v2");
        assert_eq!(slug("web-client"), "web-client");
        assert_eq!(slug("(((" ), "project");
    }

    #[test]
    fn same_name_under_different_roots_gets_distinct_databases() {
        let a = locate(Path::new("/home/a/web"), Path::new("/data"));
        let b = locate(Path::new("/home/b/web"), Path::new("/data"));
        assert_eq!(a.project, "web");
        assert_eq!(b.project, "web");
        assert_ne!(a.db_path, b.db_path);
        let name = a.db_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("web-"));
        assert!(name.ends_with(".sqlite"));
    }

    #[test]
    fn should_analyze_tracks_content_changes() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("argus.sqlite");
        let file = td.path().join("sample.js");
        std::fs::write(&file, "function f() {}").unwrap();

        let pool = Cache::init(&db).unwrap();
        let cache = Cache::from_pool("proj", &pool).unwrap();

        // first time: nothing in DB → must analyze
        assert!(cache.should_analyze(&file).unwrap());

        // after upsert: no changes → should *not* analyze
        cache.upsert_file(&file).unwrap();
        assert!(!cache.should_analyze(&file).unwrap());

        // modify contents
        std::thread::sleep(std::time::Duration::from_millis(25)); // ensure mtime tick
        std::fs::write(&file, "function f() { /* changed */ }").unwrap();
        assert!(cache.should_analyze(&file).unwrap());
    }

    #[test]
    fn store_and_load_round_trips_findings() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("argus.sqlite");
        let file = td.path().join("code.js");
        std::fs::write(&file, "function d() { const x = 1; return 2; }").unwrap();

        let pool = Cache::init(&db).unwrap();
        let mut cache = Cache::from_pool("proj", &pool).unwrap();

        let raw = analyze_source(
            &file,
            &std::fs::read(&file).unwrap(),
            &CancelToken::new(),
        )
        .unwrap()
        .unwrap();
        cache.store_analysis(&raw).unwrap();

        let loaded = cache.load_analysis(&file).unwrap().unwrap();
        assert_eq!(loaded.functions.len(), raw.functions.len());
        let (a, b) = (&raw.functions[0], &loaded.functions[0]);
        assert_eq!(a.name, b.name);
        assert_eq!(a.complexity, b.complexity);
        assert_eq!(a.findings.len(), b.findings.len());
        assert_eq!(a.counts, b.counts);
        for (x, y) in a.findings.iter().zip(&b.findings) {
            assert_eq!(x.category, y.category);
            assert_eq!(x.severity, y.severity);
            assert_eq!(x.loc, y.loc);
            assert_eq!(x.message, y.message);
        }
    }

    #[test]
    fn clear_and_vacuum_reset_tables() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("argus.sqlite");
        let f = td.path().join("f.js");
        std::fs::write(&f, "//").unwrap();

        let pool = Cache::init(&db).unwrap();
        let cache = Cache::from_pool("proj", &pool).unwrap();
        cache.upsert_file(&f).unwrap();

        assert!(!cache.get_files().unwrap().is_empty());
        cache.clear().unwrap();
        cache.vacuum().unwrap();
        assert!(cache.get_files().unwrap().is_empty());
    }
}
