//! Persistent candidate store.
//!
//! One SQLite database owns method identity, the per-method mutable
//! fields, and the pair registry. All writes serialize through the
//! store's connection mutex; callers share the store by reference.

use std::collections::HashSet;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::core::{CompileState, ExtractedMethod, Result};

const METHODS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS methods (
    signature TEXT NOT NULL,
    name TEXT NOT NULL,
    raw_text BLOB NOT NULL,
    normalized_text BLOB NOT NULL,
    size INTEGER NOT NULL,
    branches INTEGER NOT NULL,
    fingerprint BLOB NOT NULL,
    path TEXT NOT NULL,
    start INTEGER NOT NULL,
    \"end\" INTEGER NOT NULL,
    repo TEXT,
    revision TEXT,
    compilable INTEGER NOT NULL DEFAULT -1,
    test_count INTEGER NOT NULL DEFAULT -1,
    generated_test BLOB,
    generated_scaffolding BLOB,
    group_id INTEGER NOT NULL DEFAULT -1,
    id INTEGER PRIMARY KEY AUTOINCREMENT
)";

/// NULL provenance must still participate in the uniqueness invariant,
/// so the index coalesces the nullable columns.
const METHODS_SAMENESS_INDEX: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS method_sameness
ON methods (path, start, \"end\", ifnull(repo, ''), ifnull(revision, ''))";

const PAIRS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pairs (
    left_id INTEGER NOT NULL,
    right_id INTEGER NOT NULL,
    id INTEGER PRIMARY KEY AUTOINCREMENT
)";

const PAIRS_SAMENESS_INDEX: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS pair_sameness ON pairs (left_id, right_id)";

/// Outcome of a batch insertion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// The candidate store.
pub struct MethodStore {
    conn: Mutex<Connection>,
}

impl MethodStore {
    /// Open (creating if necessary) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Open an in-memory store. Test-only convenience.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "{METHODS_SCHEMA};{METHODS_SAMENESS_INDEX};{PAIRS_SCHEMA};{PAIRS_SAMENESS_INDEX};"
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a batch of methods. Records violating the uniqueness
    /// invariant are counted as duplicates, not errors.
    pub fn add_methods(&self, methods: &[ExtractedMethod]) -> Result<AddOutcome> {
        if methods.is_empty() {
            return Ok(AddOutcome::default());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut outcome = AddOutcome::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO methods
                 (signature, name, raw_text, normalized_text, size, branches, fingerprint,
                  path, start, \"end\", repo, revision, compilable, test_count, group_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, -1, -1, -1)",
            )?;
            for method in methods {
                let changed = stmt.execute(params![
                    method.signature(),
                    method.name,
                    method.raw_text.as_bytes(),
                    method.normalized_text.as_bytes(),
                    method.statements,
                    method.branches,
                    method.fingerprint(),
                    method.path,
                    method.start_line,
                    method.end_line,
                    method.repository,
                    method.revision,
                ])?;
                if changed == 0 {
                    warn!(
                        signature = %method.named_signature(),
                        path = %method.path,
                        "already registered"
                    );
                    outcome.duplicates += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(outcome)
    }

    /// List all distinct structural signatures.
    pub fn signatures(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT signature FROM methods ORDER BY signature")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// List every method with the given signature, ordered by normalized
    /// text and id. This is the full set used for clustering.
    pub fn methods_for_signature(&self, signature: &str) -> Result<Vec<ExtractedMethod>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT signature, name, raw_text, normalized_text, size, branches,
                    path, start, \"end\", repo, revision, id
             FROM methods WHERE signature = ?1
             ORDER BY normalized_text, id",
        )?;
        let rows = stmt.query_map([signature], row_to_method)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// One representative per normalized form, for display counts.
    pub fn representatives_for_signature(&self, signature: &str) -> Result<Vec<ExtractedMethod>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT signature, name, raw_text, normalized_text, size, branches,
                    path, start, \"end\", repo, revision, min(id)
             FROM methods WHERE signature = ?1
             GROUP BY normalized_text
             ORDER BY normalized_text",
        )?;
        let rows = stmt.query_map([signature], row_to_method)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Whether a method with this id is stored.
    pub fn exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM methods WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Record the compilation outcome of a candidate unit.
    pub fn set_compile_state(&self, id: i64, state: CompileState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE methods SET compilable = ?1 WHERE id = ?2",
            params![state.as_column(), id],
        )?;
        Ok(())
    }

    /// Read the compilation state; unknown ids read as not evaluated.
    pub fn compile_state(&self, id: i64) -> Result<CompileState> {
        let conn = self.conn.lock();
        let value: Option<i64> = conn
            .query_row("SELECT compilable FROM methods WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.map(CompileState::from_column).unwrap_or(CompileState::NotEvaluated))
    }

    /// Persist a generated suite and its scaffolding.
    pub fn set_tests(&self, id: i64, count: i64, suite: &[u8], scaffolding: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE methods
             SET test_count = ?1, generated_test = ?2, generated_scaffolding = ?3
             WHERE id = ?4",
            params![count, suite, scaffolding, id],
        )?;
        Ok(())
    }

    /// Number of generated tests; unknown ids and unevaluated candidates
    /// read as zero.
    pub fn test_count(&self, id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let value: Option<i64> = conn
            .query_row("SELECT test_count FROM methods WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.unwrap_or(0).max(0))
    }

    /// Fetch the persisted suite payloads, if any.
    pub fn generated_tests(&self, id: i64) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let conn = self.conn.lock();
        let row: Option<(Option<Vec<u8>>, Option<Vec<u8>>)> = conn
            .query_row(
                "SELECT generated_test, generated_scaffolding FROM methods WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((Some(suite), Some(scaffolding))) => Some((suite, scaffolding)),
            _ => None,
        })
    }

    /// Append an equivalence pair. The pair key is unordered; a re-append
    /// is reported as `false`, not an error.
    pub fn add_pair(&self, left_id: i64, right_id: i64) -> Result<bool> {
        if left_id <= 0 || right_id <= 0 {
            return Ok(false);
        }
        let (low, high) = if left_id <= right_id {
            (left_id, right_id)
        } else {
            (right_id, left_id)
        };
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO pairs (left_id, right_id) VALUES (?1, ?2)",
            params![low, high],
        )?;
        if changed == 0 {
            warn!(left_id, right_id, "pair already registered");
        }
        Ok(changed > 0)
    }

    /// List all recorded pairs, in insertion order.
    pub fn pairs(&self) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT left_id, right_id FROM pairs ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Write an equivalence group id onto a batch of methods.
    pub fn set_group(&self, ids: &[i64], group_id: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE methods SET group_id = ?1 WHERE id = ?2")?;
            for id in ids {
                stmt.execute(params![group_id, id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Read back the group id of a method (-1 when unassigned).
    pub fn group_of(&self, id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let value: Option<i64> = conn
            .query_row("SELECT group_id FROM methods WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.unwrap_or(-1))
    }

    /// Whether the given ids span more than one distinct fingerprint.
    /// Partitions that do not are syntactically uniform and are dropped.
    pub fn spans_multiple_fingerprints(&self, ids: &[i64]) -> Result<bool> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT fingerprint FROM methods WHERE id = ?1")?;
        let mut fingerprints = HashSet::new();
        for id in ids {
            let fp: Vec<u8> = stmt.query_row([id], |row| row.get(0))?;
            fingerprints.insert(fp);
            if fingerprints.len() > 1 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn row_to_method(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExtractedMethod> {
    let signature: String = row.get(0)?;
    let raw_text: Vec<u8> = row.get(2)?;
    let normalized_text: Vec<u8> = row.get(3)?;
    let (return_type, parameters) = split_signature(&signature);
    Ok(ExtractedMethod {
        return_type,
        name: row.get(1)?,
        raw_text: String::from_utf8_lossy(&raw_text).into_owned(),
        normalized_text: String::from_utf8_lossy(&normalized_text).into_owned(),
        statements: row.get(4)?,
        branches: row.get(5)?,
        path: row.get(6)?,
        start_line: row.get(7)?,
        end_line: row.get(8)?,
        repository: row.get(9)?,
        revision: row.get(10)?,
        parameters,
        id: row.get(11)?,
    })
}

/// Split a stored signature back into return type and parameter types.
/// Commas nested in type-argument lists do not separate parameters.
fn split_signature(signature: &str) -> (String, Vec<String>) {
    let Some(open) = signature.find('(') else {
        return (signature.to_string(), Vec::new());
    };
    let return_type = signature[..open].to_string();
    let inner = signature[open + 1..].strip_suffix(')').unwrap_or("");

    let mut parameters = Vec::new();
    let mut depth = 0u32;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parameters.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        parameters.push(current);
    }
    (return_type, parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNASSIGNED_ID;

    fn method(path: &str, start: u32, normalized: &str) -> ExtractedMethod {
        ExtractedMethod {
            return_type: "int".to_string(),
            name: "f".to_string(),
            raw_text: "int f(int x) { return x + 1; }".to_string(),
            normalized_text: normalized.to_string(),
            statements: 3,
            branches: 1,
            path: path.to_string(),
            start_line: start,
            end_line: start + 5,
            repository: None,
            revision: None,
            parameters: vec!["int".to_string()],
            id: UNASSIGNED_ID,
        }
    }

    #[test]
    fn test_insert_and_duplicate_suppression() {
        let store = MethodStore::open_in_memory().unwrap();
        let methods = vec![method("A.java", 1, "n1"), method("B.java", 1, "n2")];

        let outcome = store.add_methods(&methods).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.duplicates, 0);

        // re-registration is a no-op reported as a duplicate
        let outcome = store.add_methods(&methods).unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.duplicates, 2);
    }

    #[test]
    fn test_signature_listing_and_lookup() {
        let store = MethodStore::open_in_memory().unwrap();
        let mut other = method("C.java", 1, "n3");
        other.return_type = "long".to_string();
        store
            .add_methods(&[method("A.java", 1, "n1"), method("B.java", 1, "n2"), other])
            .unwrap();

        let signatures = store.signatures().unwrap();
        assert_eq!(signatures, vec!["int(int)".to_string(), "long(int)".to_string()]);

        let methods = store.methods_for_signature("int(int)").unwrap();
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().all(|m| m.signature() == "int(int)"));
        assert!(methods.iter().all(|m| m.id > 0));
    }

    #[test]
    fn test_representatives_deduplicate_by_normalized_text() {
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                method("A.java", 1, "same"),
                method("B.java", 1, "same"),
                method("C.java", 1, "different"),
            ])
            .unwrap();

        let all = store.methods_for_signature("int(int)").unwrap();
        assert_eq!(all.len(), 3);
        let representatives = store.representatives_for_signature("int(int)").unwrap();
        assert_eq!(representatives.len(), 2);
    }

    #[test]
    fn test_compile_state_round_trip() {
        let store = MethodStore::open_in_memory().unwrap();
        store.add_methods(&[method("A.java", 1, "n1")]).unwrap();
        let id = store.methods_for_signature("int(int)").unwrap()[0].id;

        assert_eq!(store.compile_state(id).unwrap(), CompileState::NotEvaluated);
        store.set_compile_state(id, CompileState::Compilable).unwrap();
        assert_eq!(store.compile_state(id).unwrap(), CompileState::Compilable);
        store
            .set_compile_state(id, CompileState::NotCompilable)
            .unwrap();
        assert_eq!(
            store.compile_state(id).unwrap(),
            CompileState::NotCompilable
        );
        // ids never stored read as not evaluated
        assert_eq!(
            store.compile_state(9999).unwrap(),
            CompileState::NotEvaluated
        );
    }

    #[test]
    fn test_generated_tests_round_trip() {
        let store = MethodStore::open_in_memory().unwrap();
        store.add_methods(&[method("A.java", 1, "n1")]).unwrap();
        let id = store.methods_for_signature("int(int)").unwrap()[0].id;

        assert_eq!(store.test_count(id).unwrap(), 0);
        assert!(store.generated_tests(id).unwrap().is_none());

        store.set_tests(id, 7, b"suite", b"scaffolding").unwrap();
        assert_eq!(store.test_count(id).unwrap(), 7);
        let (suite, scaffolding) = store.generated_tests(id).unwrap().unwrap();
        assert_eq!(suite, b"suite");
        assert_eq!(scaffolding, b"scaffolding");
    }

    #[test]
    fn test_pair_registry_is_unordered_and_deduplicated() {
        let store = MethodStore::open_in_memory().unwrap();
        assert!(store.add_pair(3, 5).unwrap());
        assert!(!store.add_pair(5, 3).unwrap());
        assert!(!store.add_pair(3, 5).unwrap());
        assert!(!store.add_pair(0, 5).unwrap());

        assert_eq!(store.pairs().unwrap(), vec![(3, 5)]);
    }

    #[test]
    fn test_group_assignment() {
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[method("A.java", 1, "n1"), method("B.java", 1, "n2")])
            .unwrap();
        let ids: Vec<i64> = store
            .methods_for_signature("int(int)")
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();

        assert_eq!(store.group_of(ids[0]).unwrap(), -1);
        store.set_group(&ids, 4).unwrap();
        assert_eq!(store.group_of(ids[0]).unwrap(), 4);
        assert_eq!(store.group_of(ids[1]).unwrap(), 4);
    }

    #[test]
    fn test_spans_multiple_fingerprints() {
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                method("A.java", 1, "same"),
                method("B.java", 1, "same"),
                method("C.java", 1, "different"),
            ])
            .unwrap();
        let methods = store.methods_for_signature("int(int)").unwrap();
        let ids: Vec<i64> = methods.iter().map(|m| m.id).collect();

        let same: Vec<i64> = methods
            .iter()
            .filter(|m| m.normalized_text == "same")
            .map(|m| m.id)
            .collect();
        assert_eq!(same.len(), 2);
        assert!(!store.spans_multiple_fingerprints(&same).unwrap());
        assert!(store.spans_multiple_fingerprints(&ids).unwrap());
    }

    #[test]
    fn test_split_signature_handles_nested_generics() {
        let (ret, params) = split_signature("Map<String,Integer>(List<Map<String,Long>>,int)");
        assert_eq!(ret, "Map<String,Integer>");
        assert_eq!(
            params,
            vec!["List<Map<String,Long>>".to_string(), "int".to_string()]
        );

        let (ret, params) = split_signature("int()");
        assert_eq!(ret, "int");
        assert!(params.is_empty());
    }
}
