//! Deadlock detection over a wait-for graph.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug)]
struct TxnEntry {
    started: Instant,
    tables: HashSet<String>,
}

#[derive(Debug, Default)]
struct DetectorState {
    /// Active transactions and the tables they hold.
    transactions: HashMap<String, TxnEntry>,
    /// Reported waits: waiter id -> ids it waits on.
    waits: HashMap<String, HashSet<String>>,
}

/// Tracks which transactions hold which tables and detects mutual-wait
/// cycles.
///
/// `detect_deadlock` records the requester's wait edges against the current
/// holders of the contended table, then searches the wait-for graph for a
/// path back to the requester. Holders whose table sets overlap the
/// requester's are treated as implied waiters on the requester, so a
/// two-party mutual wait is detected on the first call; longer cycles are
/// found once each participant has reported its wait.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    inner: Mutex<DetectorState>,
}

impl DeadlockDetector {
    /// Creates an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transaction's start time and held table set.
    pub fn register_transaction<I, S>(&self, id: &str, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.inner.lock();
        state.transactions.insert(
            id.to_string(),
            TxnEntry {
                started: Instant::now(),
                tables: tables.into_iter().map(Into::into).collect(),
            },
        );
    }

    /// Removes a transaction and every wait edge referencing it.
    pub fn unregister_transaction(&self, id: &str) {
        let mut state = self.inner.lock();
        state.transactions.remove(id);
        state.waits.remove(id);
        for holders in state.waits.values_mut() {
            holders.remove(id);
        }
    }

    /// Clears the wait edges of a transaction whose retry went through.
    pub fn clear_wait(&self, id: &str) {
        self.inner.lock().waits.remove(id);
    }

    /// Reports that `id` is blocked on `waiting_for_table` and returns true
    /// when that wait closes a cycle.
    pub fn detect_deadlock(&self, id: &str, waiting_for_table: &str) -> bool {
        let mut state = self.inner.lock();

        let Some(own_tables) = state.transactions.get(id).map(|e| e.tables.clone()) else {
            return false;
        };

        let holders: HashSet<String> = state
            .transactions
            .iter()
            .filter(|(other, entry)| {
                other.as_str() != id && entry.tables.contains(waiting_for_table)
            })
            .map(|(other, _)| other.clone())
            .collect();

        if holders.is_empty() {
            state.waits.remove(id);
            return false;
        }
        state.waits.insert(id.to_string(), holders.clone());

        // Extend the reported graph with implied edges: a holder whose table
        // set overlaps ours is (or will be) blocked on us.
        let mut edges: HashMap<String, HashSet<String>> = state.waits.clone();
        for holder in &holders {
            if let Some(entry) = state.transactions.get(holder) {
                if !entry.tables.is_disjoint(&own_tables) {
                    edges.entry(holder.clone()).or_default().insert(id.to_string());
                }
            }
        }

        cycle_back_to(&edges, id)
    }

    /// Selects the transaction to abort: the most recently started one,
    /// preserving older work.
    #[must_use]
    pub fn get_deadlock_victim(&self, ids: &[String]) -> Option<String> {
        let state = self.inner.lock();
        ids.iter()
            .filter_map(|id| state.transactions.get(id).map(|e| (id, e.started)))
            .max_by_key(|(_, started)| *started)
            .map(|(id, _)| id.clone())
    }

    /// Number of registered transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.lock().transactions.len()
    }
}

/// True when a path from `start`'s wait targets leads back to `start`.
fn cycle_back_to(edges: &HashMap<String, HashSet<String>>, start: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = edges
        .get(start)
        .map(|targets| targets.iter().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(targets) = edges.get(node) {
            stack.extend(targets.iter().map(String::as_str));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn no_deadlock_without_contention() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["users"]);
        assert!(!detector.detect_deadlock("a", "orders"));
    }

    #[test]
    fn two_party_mutual_wait_detected_on_first_call() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["users", "orders"]);
        detector.register_transaction("b", ["orders", "users"]);

        // a blocks on orders, held by b, whose tables overlap a's.
        assert!(detector.detect_deadlock("a", "orders"));
    }

    #[test]
    fn waiting_on_a_disjoint_holder_is_not_a_deadlock() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["users"]);
        detector.register_transaction("b", ["orders"]);

        assert!(!detector.detect_deadlock("a", "orders"));
    }

    #[test]
    fn three_party_cycle_detected_once_all_report() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["t1"]);
        detector.register_transaction("b", ["t2"]);
        detector.register_transaction("c", ["t3"]);

        // a -> t2 (b), b -> t3 (c): no cycle yet.
        assert!(!detector.detect_deadlock("a", "t2"));
        assert!(!detector.detect_deadlock("b", "t3"));
        // c -> t1 (a) closes a -> b -> c -> a.
        assert!(detector.detect_deadlock("c", "t1"));
    }

    #[test]
    fn unregister_removes_edges() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["t1"]);
        detector.register_transaction("b", ["t2"]);
        detector.register_transaction("c", ["t3"]);
        assert!(!detector.detect_deadlock("a", "t2"));
        assert!(!detector.detect_deadlock("b", "t3"));

        detector.unregister_transaction("b");
        assert!(!detector.detect_deadlock("c", "t1"));
        assert_eq!(detector.active_count(), 2);
    }

    #[test]
    fn victim_is_most_recently_started() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("old", ["t1"]);
        thread::sleep(Duration::from_millis(5));
        detector.register_transaction("young", ["t2"]);

        let victim = detector.get_deadlock_victim(&["old".into(), "young".into()]);
        assert_eq!(victim.as_deref(), Some("young"));
    }

    #[test]
    fn clear_wait_resets_reported_edges() {
        let detector = DeadlockDetector::new();
        detector.register_transaction("a", ["t1"]);
        detector.register_transaction("b", ["t2"]);
        detector.register_transaction("c", ["t3"]);
        assert!(!detector.detect_deadlock("a", "t2"));
        detector.clear_wait("a");

        assert!(!detector.detect_deadlock("b", "t3"));
        // a's edge is gone, so c -> a no longer closes a cycle.
        assert!(!detector.detect_deadlock("c", "t1"));
    }
}
