//! Dependency-graph construction and parallel-set selection (SPEC_FULL §4.F).
//!
//! Three edge kinds feed the same blocking relation: explicit `dependsOn`
//! (ordering, not blocking by itself — handled separately via completion),
//! explicit `conflicts`, and implicit file-conflict edges derived from
//! `estimatedFiles`. A fourth kind, package-overlap, is a warning-only edge
//! that does not block co-scheduling; it exists so callers can log it.

use std::collections::HashSet;

use undercity_kernel::PlannedTask;

/// The top-level-directory package scope of a file path, or `None` for a
/// file with no directory component (SPEC_FULL §4.F: "the top-level
/// directory component of an estimated-touched file path", e.g.
/// `src/auth/login.ts` and `src/auth/session.ts` share scope `src/auth`).
pub fn package_scope(file: &str) -> Option<String> {
    file.rsplit_once('/').map(|(dir, _)| dir.to_string())
}

fn files_conflict(a: &PlannedTask, b: &PlannedTask) -> bool {
    a.estimated_files.iter().any(|f| b.estimated_files.contains(f))
}

fn package_overlap(a: &PlannedTask, b: &PlannedTask) -> bool {
    let a_scopes: HashSet<Option<String>> =
        a.estimated_files.iter().map(|f| package_scope(f)).collect();
    b.estimated_files
        .iter()
        .any(|f| a_scopes.contains(&package_scope(f)))
}

fn explicit_conflict(a: &PlannedTask, b: &PlannedTask) -> bool {
    a.conflicts.contains(&b.id) || b.conflicts.contains(&a.id)
}

/// Whether two tasks hold a hard (blocking) edge: explicit `conflicts` or a
/// shared estimated file. Package overlap alone never blocks co-scheduling.
pub fn blocking_conflict(a: &PlannedTask, b: &PlannedTask) -> bool {
    explicit_conflict(a, b) || files_conflict(a, b)
}

/// Tasks sharing package scope but no blocking edge — worth surfacing as a
/// warning (SPEC_FULL §4.F), never as a reason to refuse co-scheduling.
pub fn warns_package_overlap(a: &PlannedTask, b: &PlannedTask) -> bool {
    !blocking_conflict(a, b) && package_overlap(a, b)
}

/// A task is runnable once every entry in `dependsOn` has completed.
pub fn dependencies_satisfied(task: &PlannedTask, completed: &HashSet<String>) -> bool {
    task.depends_on.iter().all(|dep| completed.contains(dep))
}

/// Picks a maximal antichain of mutually non-blocking tasks, up to `budget`
/// entries, from `candidates` (already filtered to tasks with satisfied
/// dependencies that are not already running). `already_chosen` holds tasks
/// presently in flight, which count against the blocking check but are never
/// themselves re-selected.
///
/// Greedy by descending priority (ties broken by task id for determinism):
/// walk candidates in that order, admitting a task only if it conflicts with
/// neither an already-in-flight task nor one already admitted this round.
/// This is a heuristic stand-in for exhaustive maximum-weight-antichain
/// search, which is combinatorial in the number of candidates; priority
/// order approximates "highest-value work first" without enumerating every
/// subset.
pub fn select_parallel_set<'a>(
    candidates: &[&'a PlannedTask],
    already_chosen: &[&'a PlannedTask],
    budget: usize,
) -> Vec<&'a PlannedTask> {
    if budget == 0 {
        return Vec::new();
    }
    let mut ordered: Vec<&PlannedTask> = candidates.to_vec();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let mut chosen: Vec<&PlannedTask> = Vec::new();
    for candidate in ordered {
        if chosen.len() >= budget {
            break;
        }
        let blocked = already_chosen
            .iter()
            .chain(chosen.iter())
            .any(|other| blocking_conflict(candidate, other));
        if !blocked {
            chosen.push(candidate);
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: i32, depends_on: &[&str], conflicts: &[&str], files: &[&str]) -> PlannedTask {
        PlannedTask {
            id: id.to_string(),
            objective: format!("objective for {id}"),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            conflicts: conflicts.iter().map(|s| s.to_string()).collect(),
            priority,
            estimated_files: files.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn package_scope_is_parent_directory() {
        assert_eq!(package_scope("src/auth/login.ts"), Some("src/auth".to_string()));
        assert_eq!(package_scope("README.md"), None);
    }

    #[test]
    fn explicit_conflicts_are_symmetric() {
        let a = task("a", 0, &[], &["b"], &[]);
        let b = task("b", 0, &[], &[], &[]);
        assert!(blocking_conflict(&a, &b));
        assert!(blocking_conflict(&b, &a));
    }

    #[test]
    fn shared_estimated_file_blocks() {
        let a = task("a", 0, &[], &[], &["src/x.ts"]);
        let b = task("b", 0, &[], &[], &["src/x.ts"]);
        assert!(blocking_conflict(&a, &b));
    }

    #[test]
    fn package_overlap_alone_does_not_block() {
        let a = task("a", 0, &[], &[], &["src/auth/login.ts"]);
        let b = task("b", 0, &[], &[], &["src/auth/session.ts"]);
        assert!(!blocking_conflict(&a, &b));
        assert!(warns_package_overlap(&a, &b));
    }

    #[test]
    fn dependencies_gate_runnability() {
        let t = task("a", 0, &["b"], &[], &[]);
        let mut completed = HashSet::new();
        assert!(!dependencies_satisfied(&t, &completed));
        completed.insert("b".to_string());
        assert!(dependencies_satisfied(&t, &completed));
    }

    #[test]
    fn select_parallel_set_respects_budget_and_conflicts() {
        let a = task("a", 5, &[], &[], &["src/x.ts"]);
        let b = task("b", 4, &[], &[], &["src/x.ts"]);
        let c = task("c", 3, &[], &[], &["src/y.ts"]);
        let candidates = vec![&a, &b, &c];
        let chosen = select_parallel_set(&candidates, &[], 2);
        let ids: Vec<&str> = chosen.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn select_parallel_set_avoids_already_in_flight() {
        let running = task("running", 0, &[], &[], &["src/x.ts"]);
        let candidate = task("cand", 0, &[], &[], &["src/x.ts"]);
        let candidates = vec![&candidate];
        let chosen = select_parallel_set(&candidates, &[&running], 5);
        assert!(chosen.is_empty());
    }
}
