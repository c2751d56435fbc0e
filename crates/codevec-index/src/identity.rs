//! Unique ids for store entries.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use codevec_core::Artifact;

/// Hands out ids of the form `<path>:<enclosing_type_name>`, unique within
/// one ingestion batch.
///
/// A taken id gets a `.1`, `.2`, ... suffix from a per-base counter, so the
/// same inputs in the same order always produce the same ids. Safe to share
/// across tasks.
///
/// # Examples
///
/// ```
/// use codevec_core::Artifact;
/// use codevec_index::identity::IdentityAssigner;
///
/// let ids = IdentityAssigner::new();
/// let a = Artifact::new("Foo", "void a() {}", 2, 2);
/// let b = Artifact::new("Foo", "void b() {}", 3, 3);
/// assert_eq!(ids.assign_id("src/Foo.java", &a), "src/Foo.java:Foo");
/// assert_eq!(ids.assign_id("src/Foo.java", &b), "src/Foo.java:Foo.1");
/// ```
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    state: Mutex<IdState>,
}

#[derive(Debug, Default)]
struct IdState {
    taken: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl IdentityAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and register a unique id for `artifact` found in `path`.
    pub fn assign_id(&self, path: &str, artifact: &Artifact) -> String {
        let base = format!("{path}:{}", artifact.enclosing_type_name);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut candidate = base.clone();
        while state.taken.contains(&candidate) {
            let n = state.next_suffix.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{base}.{n}");
        }

        state.taken.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn unit(type_name: &str) -> Artifact {
        Artifact::new(type_name, "x", 1, 1)
    }

    #[test]
    fn distinct_bases_need_no_suffix() {
        let ids = IdentityAssigner::new();
        assert_eq!(ids.assign_id("a.py", &unit("")), "a.py:");
        assert_eq!(ids.assign_id("b.py", &unit("")), "b.py:");
        assert_eq!(ids.assign_id("a.py", &unit("Cls")), "a.py:Cls");
    }

    #[test]
    fn collisions_get_incrementing_suffixes() {
        let ids = IdentityAssigner::new();
        let got: Vec<String> = (0..4).map(|_| ids.assign_id("m.rs", &unit("S"))).collect();
        assert_eq!(got, vec!["m.rs:S", "m.rs:S.1", "m.rs:S.2", "m.rs:S.3"]);
    }

    #[test]
    fn suffix_skips_ids_that_exist_as_bases() {
        // "f:T.1" is first taken as a base of its own.
        let ids = IdentityAssigner::new();
        assert_eq!(ids.assign_id("f", &unit("T.1")), "f:T.1");
        assert_eq!(ids.assign_id("f", &unit("T")), "f:T");
        assert_eq!(ids.assign_id("f", &unit("T")), "f:T.2");
    }

    #[test]
    fn same_sequence_gives_same_ids() {
        let run = || {
            let ids = IdentityAssigner::new();
            ["A", "A", "", "B", "A"]
                .iter()
                .map(|t| ids.assign_id("Main.java", &unit(t)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn concurrent_assignment_never_repeats() {
        let ids = Arc::new(IdentityAssigner::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| ids.assign_id("shared.go", &unit("Server")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate id");
            }
        }
        assert_eq!(all.len(), 400);
    }
}
