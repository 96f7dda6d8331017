// 🧲 Clustering - group same-account transactions that look like one event
//
// Two strategies share one pairwise predicate (MatchWindow):
//   SeedClustering       - every candidate is compared with the cluster seed
//                          only, so chains of near-matches are NOT merged
//   TransitiveClustering - union-find over the same predicate
//
// The seed-only strategy is the default and reproduces the production
// grouping exactly, including its non-transitive behaviour.

use crate::db::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// PAIRWISE PREDICATE
// ============================================================================

/// Amount/date window two transactions must fall within to be duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchWindow {
    /// Max absolute amount difference, in minor units (1 = 0.01)
    pub amount_tolerance_minor: i64,

    /// Max absolute event-date difference, in days
    pub max_days_apart: i64,
}

impl Default for MatchWindow {
    fn default() -> Self {
        MatchWindow {
            amount_tolerance_minor: 1,
            max_days_apart: 30,
        }
    }
}

impl MatchWindow {
    pub fn matches(&self, a: &Transaction, b: &Transaction) -> bool {
        // Opposite-sign amounts near the i64 bounds must not overflow
        let tolerance = self.amount_tolerance_minor.max(0) as u64;
        if a.amount_minor.abs_diff(b.amount_minor) > tolerance {
            return false;
        }

        let days = (a.event_date - b.event_date).num_days().abs();
        days <= self.max_days_apart
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// Turns one account's transactions into clusters of indices.
///
/// Input order is significant (store order). Returned clusters contain
/// at least two indices each, in discovery order; singletons are dropped.
pub trait ClusterStrategy: Send + Sync {
    fn cluster(&self, transactions: &[Transaction], window: &MatchWindow) -> Vec<Vec<usize>>;
}

/// Compare each unclaimed candidate with the seed only.
///
/// If U matches seed T and V matches U but not T, V stays out of T's
/// cluster and may seed its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedClustering;

impl ClusterStrategy for SeedClustering {
    fn cluster(&self, transactions: &[Transaction], window: &MatchWindow) -> Vec<Vec<usize>> {
        let mut claimed = vec![false; transactions.len()];
        let mut clusters = Vec::new();

        for seed in 0..transactions.len() {
            if claimed[seed] {
                continue;
            }
            claimed[seed] = true;

            let mut members = vec![seed];
            for candidate in (seed + 1)..transactions.len() {
                if claimed[candidate] {
                    continue;
                }
                if window.matches(&transactions[seed], &transactions[candidate]) {
                    claimed[candidate] = true;
                    members.push(candidate);
                }
            }

            if members.len() >= 2 {
                clusters.push(members);
            }
        }

        clusters
    }
}

/// Connected components of the match graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveClustering;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the lower index as root so clusters are ordered by first member
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

impl ClusterStrategy for TransitiveClustering {
    fn cluster(&self, transactions: &[Transaction], window: &MatchWindow) -> Vec<Vec<usize>> {
        let n = transactions.len();
        let mut uf = UnionFind::new(n);

        for i in 0..n {
            for j in (i + 1)..n {
                if window.matches(&transactions[i], &transactions[j]) {
                    uf.union(i, j);
                }
            }
        }

        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut root_order = Vec::new();
        for i in 0..n {
            let root = uf.find(i);
            let members = by_root.entry(root).or_insert_with(|| {
                root_order.push(root);
                Vec::new()
            });
            members.push(i);
        }

        root_order
            .into_iter()
            .filter_map(|root| by_root.remove(&root))
            .filter(|members| members.len() >= 2)
            .collect()
    }
}

/// Which clustering strategy a scan uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringStrategy {
    #[default]
    SeedOnly,
    Transitive,
}

impl ClusteringStrategy {
    pub fn build(&self) -> Box<dyn ClusterStrategy> {
        match self {
            ClusteringStrategy::SeedOnly => Box::new(SeedClustering),
            ClusteringStrategy::Transitive => Box::new(TransitiveClustering),
        }
    }
}

// ============================================================================
// ACCOUNT PARTITIONING
// ============================================================================

/// Split transactions by account, keeping the original relative order both
/// within each partition and across partitions (first-seen account first).
pub fn partition_by_account(transactions: &[Transaction]) -> Vec<(String, Vec<Transaction>)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<(String, Vec<Transaction>)> = Vec::new();

    for tx in transactions {
        let slot = *positions.entry(tx.account_id.as_str()).or_insert_with(|| {
            partitions.push((tx.account_id.clone(), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(tx.clone());
    }

    partitions
}
