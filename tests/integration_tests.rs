//! End-to-end tests driving the equimine binary against a small corpus.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

use equimine::store::MethodStore;

const ALPHA: &str = "public class Alpha {
  public int tally(Set<Integer> values) {
    int total = 100;
    if (values.isEmpty()) {
      total = 0;
    }
    return total + values.size();
  }
}
";

// Alpha with different identifiers and literals; normalizes to the same
// canonical text.
const BETA: &str = "public class Beta {
  public int accumulate(Set<Integer> input) {
    int acc = 7;
    if (input.isEmpty()) {
      acc = 3;
    }
    return acc + input.size();
  }
}
";

// Same signature, different control flow.
const GAMMA: &str = "public class Gamma {
  public int tally(Set<Integer> values) {
    int total = 0;
    while (total < values.size()) {
      total = total + 1;
    }
    return total;
  }
}
";

// Rejected outright: checked exception in the throws clause.
const DELTA: &str = "public class Delta {
  public int tally(Set<Integer> values) throws Exception {
    if (values.isEmpty()) {
      return 1;
    }
    return values.size();
  }
}
";

fn write_corpus(root: &Path) -> PathBuf {
    let corpus = root.join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("Alpha.java"), ALPHA).unwrap();
    fs::write(corpus.join("Beta.java"), BETA).unwrap();
    fs::write(corpus.join("Gamma.java"), GAMMA).unwrap();
    fs::write(corpus.join("Delta.java"), DELTA).unwrap();
    corpus
}

fn equimine() -> Command {
    Command::cargo_bin("equimine").unwrap()
}

#[test]
fn extract_registers_methods_and_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = write_corpus(temp.path());
    let db = temp.path().join("corpus.db");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .arg("--source")
        .arg(&corpus)
        .assert()
        .success()
        .stdout(predicate::str::contains("registered: 3 (duplicates: 0)"));

    // re-running against the unchanged snapshot inserts zero new rows
    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .arg("--source")
        .arg(&corpus)
        .assert()
        .success()
        .stdout(predicate::str::contains("registered: 0 (duplicates: 3)"));

    let store = MethodStore::open(&db).unwrap();
    let signatures = store.signatures().unwrap();
    assert_eq!(signatures, vec!["int(Set<Integer>)".to_string()]);
    let methods = store.methods_for_signature("int(Set<Integer>)").unwrap();
    assert_eq!(methods.len(), 3);
}

#[test]
fn extract_requires_a_source() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("corpus.db");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "either --source or --repository must be specified",
        ));
}

#[test]
fn extract_skips_test_and_sample_paths() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = write_corpus(temp.path());
    fs::create_dir_all(corpus.join("test")).unwrap();
    fs::write(
        corpus.join("test/Echo.java"),
        ALPHA.replace("Alpha", "Echo"),
    )
    .unwrap();
    fs::create_dir_all(corpus.join("examples")).unwrap();
    fs::write(
        corpus.join("examples/Foxtrot.java"),
        ALPHA.replace("Alpha", "Foxtrot"),
    )
    .unwrap();
    let db = temp.path().join("corpus.db");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .arg("--source")
        .arg(&corpus)
        .assert()
        .success()
        .stdout(predicate::str::contains("tests: 1"))
        .stdout(predicate::str::contains("toys: 1"))
        .stdout(predicate::str::contains("registered: 3"));
}

#[test]
fn classify_emits_one_group_with_all_survivors() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = write_corpus(temp.path());
    let db = temp.path().join("corpus.db");
    let out = temp.path().join("out");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .arg("--source")
        .arg(&corpus)
        .assert()
        .success();

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("classify")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "target methods have been classified into 1 groups.",
        ));

    let group_dir = out.join("1.int(Set<Integer>)");
    assert!(group_dir.is_dir());

    let unit_dirs: Vec<PathBuf> = fs::read_dir(&group_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(unit_dirs.len(), 3);

    for unit_dir in unit_dirs {
        let unit = fs::read_to_string(unit_dir.join("Target.java")).unwrap();
        assert!(unit.contains("public class Target {"));
        assert!(unit.contains("int __target__(Set<Integer>"));
        assert!(unit.contains("// path:"));
        assert!(unit.contains("// lines:"));
        // modifiers were stripped during extraction
        assert!(!unit.contains("public int"));
    }
}

#[test]
fn fingerprints_separate_syntactic_from_behavioral_identity() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = write_corpus(temp.path());
    let db = temp.path().join("corpus.db");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("extract")
        .arg("--source")
        .arg(&corpus)
        .assert()
        .success();

    let store = MethodStore::open(&db).unwrap();
    let methods = store.methods_for_signature("int(Set<Integer>)").unwrap();

    let alpha = methods.iter().find(|m| m.path.ends_with("Alpha.java")).unwrap();
    let beta = methods.iter().find(|m| m.path.ends_with("Beta.java")).unwrap();
    let gamma = methods.iter().find(|m| m.path.ends_with("Gamma.java")).unwrap();

    // renames and literal changes normalize away, control flow does not
    assert_eq!(alpha.fingerprint(), beta.fingerprint());
    assert_ne!(alpha.fingerprint(), gamma.fingerprint());

    // a partition of alpha and beta alone would be syntactically uniform
    assert!(!store
        .spans_multiple_fingerprints(&[alpha.id, beta.id])
        .unwrap());
    assert!(store
        .spans_multiple_fingerprints(&[alpha.id, beta.id, gamma.id])
        .unwrap());
}

#[test]
fn cluster_reports_missing_output_directory() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("corpus.db");

    equimine()
        .args(["--database"])
        .arg(&db)
        .arg("cluster")
        .arg("--output")
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "output path does not exist as a directory",
        ));
}
