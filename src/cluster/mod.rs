//! Equivalence clustering engine.
//!
//! Four phases per method group: compile each candidate, obtain a
//! generated suite for it, cross-execute suites between candidate pairs,
//! and finalize the surviving union-find partitions as equivalence
//! groups. Phases fan out over a bounded worker pool; recorded pairs
//! flow over a channel to a single consumer that owns the union-find
//! state.

pub mod toolchain;
mod union_find;

pub use toolchain::{count_tests, ExecOutcome, Toolchain};
pub use union_find::UnionFind;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::{CompileState, Error, Result};
use crate::store::MethodStore;

/// Limits and bounds for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker pool size; 0 means the available hardware parallelism.
    pub jobs: usize,
    /// Minimum generated-test count for a candidate to be cross-tested.
    pub min_tests: i64,
    /// Inclusive lower bound on the group index to process.
    pub lower_bound: i64,
    /// Inclusive upper bound on the group index to process.
    pub upper_bound: i64,
    /// Starting offset for assigned equivalence-group ids.
    pub group_offset: i64,
    /// Ceiling on each group's pool drain; work still outstanding past
    /// it is abandoned and the group finalizes with what completed.
    pub drain_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            min_tests: 1,
            lower_bound: 0,
            upper_bound: i64::MAX,
            group_offset: 0,
            drain_timeout: Duration::from_secs(600),
        }
    }
}

impl EngineConfig {
    /// Get the effective worker count.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1)
        } else {
            self.jobs
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    /// Group directories processed within the configured bounds.
    pub groups: usize,
    /// Candidates that compiled and carry a usable suite.
    pub candidates_prepared: usize,
    /// Candidates excluded by a compile, generation or suite failure.
    pub candidates_excluded: usize,
    /// Bidirectionally passing pairs recorded.
    pub pairs_recorded: usize,
    /// Equivalence groups persisted.
    pub equivalence_groups: usize,
}

/// A candidate that survived phases 1 and 2.
#[derive(Debug, Clone)]
struct Candidate {
    id: i64,
    unit_dir: PathBuf,
    test_dir: PathBuf,
    tests: i64,
}

/// The clustering engine. Holds the store by reference; all mutable
/// clustering state lives inside a run.
pub struct ClusterEngine<'a> {
    store: &'a MethodStore,
    toolchain: Toolchain,
    config: EngineConfig,
}

impl<'a> ClusterEngine<'a> {
    pub fn new(store: &'a MethodStore, toolchain: Toolchain, config: EngineConfig) -> Self {
        Self {
            store,
            toolchain,
            config,
        }
    }

    /// Phases 1 and 2 only: compile candidates and obtain suites for
    /// every group in bounds. Usable for partitioned pre-generation.
    pub fn generate(&self, output: &Path) -> Result<RunSummary> {
        let runtime = runtime()?;
        runtime.block_on(async {
            let mut summary = RunSummary::default();
            for (index, dir) in self.group_dirs(output)? {
                summary.groups += 1;
                let candidates = self.prepare_group(index, &dir, &mut summary).await?;
                debug!(index, prepared = candidates.len(), "group prepared");
            }
            Ok(summary)
        })
    }

    /// The full pipeline: prepare, cross-test, and finalize every group
    /// in bounds. Equivalence-group numbering is one monotonic counter
    /// across the whole run, starting past the configured offset.
    pub fn cluster(&self, output: &Path) -> Result<RunSummary> {
        let runtime = runtime()?;
        runtime.block_on(async {
            let mut summary = RunSummary::default();
            let mut next_group = self.config.group_offset;
            for (index, dir) in self.group_dirs(output)? {
                summary.groups += 1;
                let candidates = self.prepare_group(index, &dir, &mut summary).await?;

                let usable: Vec<Candidate> = candidates
                    .into_iter()
                    .filter(|c| c.tests >= self.config.min_tests)
                    .collect();
                if usable.len() < 2 {
                    debug!(index, usable = usable.len(), "nothing to cross-test");
                    continue;
                }

                let mut partition = self.cross_test_group(index, &usable, &mut summary).await?;

                for members in partition.partitions() {
                    if !self.store.spans_multiple_fingerprints(&members)? {
                        debug!(index, ?members, "dropping syntactically uniform partition");
                        continue;
                    }
                    next_group += 1;
                    self.store.set_group(&members, next_group)?;
                    summary.equivalence_groups += 1;
                    info!(index, group_id = next_group, size = members.len(), "equivalence group");
                }
            }
            Ok(summary)
        })
    }

    /// Group directories under the output root whose index falls within
    /// the configured bounds, in index order.
    fn group_dirs(&self, output: &Path) -> Result<Vec<(i64, PathBuf)>> {
        if !output.is_dir() {
            return Err(Error::config(format!(
                "output path does not exist as a directory: {}",
                output.display()
            )));
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(output)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((index, _)) = name.split_once('.') else {
                warn!(name = %name, "not a method group directory");
                continue;
            };
            let Ok(index) = index.parse::<i64>() else {
                warn!(name = %name, "not a method group directory");
                continue;
            };
            if index < self.config.lower_bound || index > self.config.upper_bound {
                continue;
            }
            dirs.push((index, entry.path()));
        }
        dirs.sort_by_key(|(index, _)| *index);
        Ok(dirs)
    }

    /// Candidate unit directories of a group: numeric names that exist
    /// in the store; sibling `_test` directories are skipped.
    fn candidate_dirs(&self, group_dir: &Path) -> Result<Vec<(i64, PathBuf)>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(group_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("_test") {
                continue;
            }
            let Ok(id) = name.parse::<i64>() else {
                continue;
            };
            if !self.store.exists(id)? {
                debug!(id, "skipping directory without a stored method");
                continue;
            }
            dirs.push((id, entry.path()));
        }
        dirs.sort_by_key(|(id, _)| *id);
        Ok(dirs)
    }

    /// Phases 1 and 2 for one group, fanned out over the pool and
    /// bounded by the drain timeout.
    async fn prepare_group(
        &self,
        index: i64,
        group_dir: &Path,
        summary: &mut RunSummary,
    ) -> Result<Vec<Candidate>> {
        let targets = self.candidate_dirs(group_dir)?;
        let total = targets.len();
        let group_name = group_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut prepared = Vec::new();
        let mut pool = stream::iter(targets.into_iter().enumerate())
            .map(|(nth, (id, unit_dir))| {
                let group_name = group_name.as_str();
                async move {
                    println!(
                        "{} [group {index}][{}/{total}] preparing candidate {id} of {group_name}",
                        chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
                        nth + 1,
                    );
                    self.prepare_candidate(index, id, unit_dir).await
                }
            })
            .buffer_unordered(self.config.effective_jobs());

        let drained = timeout(self.config.drain_timeout, async {
            while let Some(result) = pool.next().await {
                prepared.push(result?);
            }
            Ok::<(), Error>(())
        })
        .await;
        drop(pool);

        match drained {
            Ok(result) => result?,
            Err(_) => warn!(
                index,
                "preparation pool drain exceeded its ceiling; continuing with partial results"
            ),
        }

        let mut candidates = Vec::new();
        for outcome in prepared {
            match outcome {
                Some(candidate) => candidates.push(candidate),
                None => summary.candidates_excluded += 1,
            }
        }
        candidates.sort_by_key(|c| c.id);
        summary.candidates_prepared += candidates.len();
        Ok(candidates)
    }

    /// Compile one candidate and obtain a compiled suite for it.
    /// Any failure excludes the candidate; none of them abort the group.
    async fn prepare_candidate(
        &self,
        index: i64,
        id: i64,
        unit_dir: PathBuf,
    ) -> Result<Option<Candidate>> {
        let outcome = self.toolchain.compile_unit(&unit_dir).await;
        let state = if outcome.is_success() {
            CompileState::Compilable
        } else {
            CompileState::NotCompilable
        };
        self.store.set_compile_state(id, state)?;
        if state == CompileState::NotCompilable {
            debug!(index, id, phase = "compile", ?outcome, "candidate excluded");
            return Ok(None);
        }

        let test_dir = PathBuf::from(format!("{}_test", unit_dir.display()));
        if !test_dir.exists() {
            let outcome = self.toolchain.generate_suite(&unit_dir, &test_dir).await;
            if !outcome.is_success() {
                debug!(index, id, phase = "generate", ?outcome, "candidate excluded");
                return Ok(None);
            }
        }

        let outcome = self.toolchain.compile_suite(&unit_dir, &test_dir).await;
        if !outcome.is_success() {
            debug!(index, id, phase = "suite-compile", ?outcome, "candidate excluded");
            return Ok(None);
        }

        let suite = std::fs::read(test_dir.join(toolchain::SUITE_FILE))?;
        let scaffolding = std::fs::read(test_dir.join(toolchain::SCAFFOLD_FILE))?;
        let tests = count_tests(&suite);
        self.store.set_tests(id, tests, &suite, &scaffolding)?;

        Ok(Some(Candidate {
            id,
            unit_dir,
            test_dir,
            tests,
        }))
    }

    /// Phase 3 for one group: every unordered candidate pair is checked
    /// in both directions; passing pairs flow to the union-find consumer.
    async fn cross_test_group(
        &self,
        index: i64,
        candidates: &[Candidate],
        summary: &mut RunSummary,
    ) -> Result<UnionFind> {
        let mut pairs = Vec::new();
        for left in 0..candidates.len() {
            for right in left + 1..candidates.len() {
                pairs.push((&candidates[left], &candidates[right]));
            }
        }
        debug!(index, pairs = pairs.len(), "cross-testing");

        let (tx, mut rx) = mpsc::unbounded_channel::<(i64, i64)>();

        let workers = async {
            let mut pool = stream::iter(pairs.into_iter())
                .map(|(a, b)| {
                    let tx = tx.clone();
                    async move {
                        if self.check_pair(a, b).await {
                            let _ = tx.send((a.id, b.id));
                        }
                    }
                })
                .buffer_unordered(self.config.effective_jobs());

            let drained = timeout(self.config.drain_timeout, async {
                while pool.next().await.is_some() {}
            })
            .await;
            drop(pool);
            if drained.is_err() {
                warn!(
                    index,
                    "cross-test pool drain exceeded its ceiling; finalizing with partial results"
                );
            }
            drop(tx);
        };

        // sole owner of the union-find state
        let consumer = async {
            let mut partition = UnionFind::new();
            let mut recorded = 0usize;
            while let Some((left, right)) = rx.recv().await {
                self.store.add_pair(left, right)?;
                partition.union(left, right);
                recorded += 1;
            }
            Ok::<(UnionFind, usize), Error>((partition, recorded))
        };

        let ((), consumed) = tokio::join!(workers, consumer);
        let (partition, recorded) = consumed?;
        summary.pairs_recorded += recorded;
        Ok(partition)
    }

    /// Both directions must pass for the pair to be recorded.
    async fn check_pair(&self, a: &Candidate, b: &Candidate) -> bool {
        let ab = self.toolchain.run_suite(&a.unit_dir, &b.test_dir).await;
        if !ab.is_success() {
            debug!(left = a.id, right = b.id, ?ab, "pair rejected");
            return false;
        }
        let ba = self.toolchain.run_suite(&b.unit_dir, &a.test_dir).await;
        if !ba.is_success() {
            debug!(left = a.id, right = b.id, ?ba, "pair rejected");
            return false;
        }
        true
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExtractedMethod, UNASSIGNED_ID};

    fn stored_method(store: &MethodStore, path: &str, normalized: &str) -> i64 {
        store
            .add_methods(&[ExtractedMethod {
                return_type: "int".to_string(),
                name: "f".to_string(),
                raw_text: "int f(int x) { if (x > 0) { x++; } return x; }".to_string(),
                normalized_text: normalized.to_string(),
                statements: 3,
                branches: 1,
                path: path.to_string(),
                start_line: 1,
                end_line: 3,
                repository: None,
                revision: None,
                parameters: vec!["int".to_string()],
                id: UNASSIGNED_ID,
            }])
            .unwrap();
        let methods = store.methods_for_signature("int(int)").unwrap();
        methods
            .iter()
            .find(|m| m.path == path)
            .map(|m| m.id)
            .unwrap()
    }

    #[test]
    fn test_group_dirs_respects_bounds_and_order() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["3.int(int)", "1.long(int)", "12.int(Set<Integer>)", "junk"] {
            std::fs::create_dir(temp.path().join(name)).unwrap();
        }
        std::fs::write(temp.path().join("5.notadir"), "file").unwrap();

        let store = MethodStore::open_in_memory().unwrap();
        let config = EngineConfig {
            lower_bound: 2,
            upper_bound: 100,
            ..EngineConfig::default()
        };
        let engine = ClusterEngine::new(&store, Toolchain::default(), config);

        let dirs = engine.group_dirs(temp.path()).unwrap();
        let indexes: Vec<i64> = dirs.iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, vec![3, 12]);
    }

    #[test]
    fn test_group_dirs_missing_output_is_config_error() {
        let store = MethodStore::open_in_memory().unwrap();
        let engine =
            ClusterEngine::new(&store, Toolchain::default(), EngineConfig::default());
        let result = engine.group_dirs(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_candidate_dirs_filters_tests_and_unknown_ids() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        let id = stored_method(&store, "A.java", "n1");

        std::fs::create_dir(temp.path().join(id.to_string())).unwrap();
        std::fs::create_dir(temp.path().join(format!("{id}_test"))).unwrap();
        std::fs::create_dir(temp.path().join("9999")).unwrap();
        std::fs::create_dir(temp.path().join("scratch")).unwrap();

        let engine =
            ClusterEngine::new(&store, Toolchain::default(), EngineConfig::default());
        let dirs = engine.candidate_dirs(temp.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].0, id);
    }

    #[test]
    fn test_finalize_drops_uniform_partitions_and_numbers_globally() {
        // synthetic phase-4 exercise: partitions come from recorded
        // pairs, uniform-fingerprint partitions are dropped, surviving
        // ones get monotonically increasing ids past the offset
        let store = MethodStore::open_in_memory().unwrap();
        let a = stored_method(&store, "A.java", "alpha");
        let b = stored_method(&store, "B.java", "beta");
        let c = stored_method(&store, "C.java", "gamma");
        let d = stored_method(&store, "D.java", "same");
        let e = stored_method(&store, "E.java", "same");

        let mut partition = UnionFind::new();
        partition.union(a, b);
        partition.union(b, c);
        partition.union(d, e);

        let mut next_group = 10;
        let mut persisted = 0;
        for members in partition.partitions() {
            if !store.spans_multiple_fingerprints(&members).unwrap() {
                continue;
            }
            next_group += 1;
            store.set_group(&members, next_group).unwrap();
            persisted += 1;
        }

        assert_eq!(persisted, 1);
        assert_eq!(store.group_of(a).unwrap(), 11);
        assert_eq!(store.group_of(b).unwrap(), 11);
        assert_eq!(store.group_of(c).unwrap(), 11);
        // the uniform partition stays unassigned
        assert_eq!(store.group_of(d).unwrap(), -1);
        assert_eq!(store.group_of(e).unwrap(), -1);
    }

    #[test]
    fn test_effective_jobs_defaults_to_parallelism() {
        let config = EngineConfig::default();
        assert!(config.effective_jobs() >= 1);
        let config = EngineConfig {
            jobs: 3,
            ..EngineConfig::default()
        };
        assert_eq!(config.effective_jobs(), 3);
    }
}
