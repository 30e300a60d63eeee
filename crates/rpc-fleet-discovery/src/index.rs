use crate::config::{DiscoveryConfig, MAX_ACCOUNTS};
use crate::fetcher::TableSource;
use crate::table::LookupTable;
use rayon::prelude::*;
use rpc_fleet_core::PublicKey;
use std::sync::Arc;

/// Answers membership queries against the most recently published
/// `allTables` snapshot ("C7"). Never calls the dispatcher; it only reads
/// whatever [`TableSource`] currently has on hand.
pub struct DiscoveryIndex<T> {
    source: Arc<dyn TableSource<T>>,
    config: DiscoveryConfig,
}

impl<T: LookupTable> DiscoveryIndex<T> {
    pub fn new(source: Arc<dyn TableSource<T>>, config: DiscoveryConfig) -> Self {
        Self { source, config }
    }

    /// Returns a minimal set of tables covering as many of `accounts` as
    /// possible, or `None` if no tables have been published yet.
    ///
    /// `accounts.len()` must not exceed [`MAX_ACCOUNTS`].
    pub fn query(&self, accounts: &[PublicKey]) -> Option<Vec<Arc<T>>> {
        assert!(
            accounts.len() <= MAX_ACCOUNTS,
            "at most {MAX_ACCOUNTS} accounts may be queried at once"
        );

        let all_tables = self.source.all_tables()?;
        if accounts.is_empty() || all_tables.is_empty() {
            return Some(Vec::new());
        }

        let scored = self.score(&all_tables, accounts);
        Some(cover(accounts, &scored))
    }

    /// Splits `all_tables` into `num_partitions_per_query` windows, scores
    /// each in parallel, and merges the per-window top-K buffers into one
    /// descending list.
    fn score(&self, all_tables: &[Arc<T>], accounts: &[PublicKey]) -> Vec<(u32, Arc<T>)> {
        let windows = self.config.num_partitions_per_query.max(1) as usize;
        let chunk_size = all_tables.len().div_ceil(windows).max(1);
        let top_k = self.config.top_tables_per_partition as usize;
        let min_score = self.config.min_score;

        let per_window: Vec<Vec<(u32, Arc<T>)>> = all_tables
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut top: Vec<(u32, Arc<T>)> = Vec::with_capacity(top_k);
                for table in chunk {
                    let score = accounts.iter().filter(|a| table.contains(a)).count() as u32;
                    if score <= min_score {
                        continue;
                    }
                    // Insert into a bounded, descending-by-score buffer so we
                    // never need to sort more than `top_k` entries per window.
                    let position = top.partition_point(|(s, _)| *s >= score);
                    if position < top_k {
                        if top.len() == top_k {
                            top.pop();
                        }
                        top.insert(position, (score, Arc::clone(table)));
                    }
                }
                top
            })
            .collect();

        let mut merged: Vec<(u32, Arc<T>)> = per_window.into_iter().flatten().collect();
        merged.sort_by(|a, b| b.0.cmp(&a.0));
        merged
    }
}

/// Greedy set-cover over the accounts still uncovered, pruned by a 64-bit
/// coverage bitmask (accounts beyond the 64th are covered by incidental
/// overlap only, matching `MAX_ACCOUNTS`'s relationship to `u64`).
///
/// Selection stops once every account is covered or `scored` is exhausted,
/// with a hard cap of `MAX_ACCOUNTS / 2` selected tables: the fleet this
/// index serves has no query that legitimately needs more tables than that
/// to cover a 64-account batch.
fn cover<T: LookupTable>(accounts: &[PublicKey], scored: &[(u32, Arc<T>)]) -> Vec<Arc<T>> {
    let n = accounts.len();
    let mut mask: u64 = if n >= 64 { u64::MAX } else { (1u64 << n) - 1 };

    let mut selected: Vec<Arc<T>> = Vec::new();
    let mut total_accounts_found: usize = 0;
    // One account may remain unaccounted for; cover is "≥ |A| - 1".
    let target = n.saturating_sub(1);

    for (_, table) in scored {
        if mask == 0 || selected.len() >= MAX_ACCOUNTS / 2 {
            break;
        }

        let mut remaining = mask;
        let mut num_removed = 0u32;
        let mut first_bit = None;

        while remaining != 0 {
            let bit_index = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;

            if !table.contains(&accounts[bit_index]) {
                continue;
            }

            num_removed += 1;
            if first_bit.is_none() {
                // The first match on this table records its bit but leaves
                // it set; it is only cleared once the table is actually
                // selected below, so a lone match can be rolled back.
                first_bit = Some(bit_index);
            } else {
                mask &= !(1 << bit_index);
            }

            total_accounts_found += 1;
            if total_accounts_found == target {
                selected.push(Arc::clone(table));
                return selected;
            }
        }

        if num_removed > 1 {
            selected.push(Arc::clone(table));
            if let Some(bit_index) = first_bit {
                mask &= !(1 << bit_index);
            }
        } else if num_removed == 1 {
            // A table covering only one new account is never worth a
            // lookup reference; undo its contribution and leave the
            // account's bit set for a later, more productive table.
            total_accounts_found -= 1;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_support::{key, FakeTable};

    fn table(address: u8, accounts: &[u8]) -> Arc<FakeTable> {
        Arc::new(FakeTable {
            address: key(address),
            accounts: accounts.iter().map(|b| key(*b)).collect(),
        })
    }

    struct FixedSource<T> {
        tables: Option<Arc<Vec<Arc<T>>>>,
    }

    impl<T: LookupTable> TableSource<T> for FixedSource<T> {
        fn all_tables(&self) -> Option<Arc<Vec<Arc<T>>>> {
            self.tables.clone()
        }
    }

    #[test]
    fn query_returns_none_before_any_tables_are_published() {
        let source: Arc<dyn TableSource<FakeTable>> = Arc::new(FixedSource { tables: None });
        let index = DiscoveryIndex::new(source, DiscoveryConfig::default());
        assert!(index.query(&[key(1)]).is_none());
    }

    #[test]
    fn query_covers_accounts_leaving_at_most_one_uncovered() {
        // A = {a0..a9}. T1 covers {a0,a1,a2}, T2 covers {a3,a4}, T3 covers
        // {a0,a5}, T4 covers {a6,a7,a8,a9}. Expected selection {T4,T1,T2}:
        // T3 is skipped because by the time it would be considered, a0 is
        // already covered and it would remove only a5 (a single new
        // account). a5 itself is left uncovered once T2's second match
        // trips the early-exit at `|A|-1` covered.
        let accounts: Vec<PublicKey> = (0..=9).map(key).collect();
        let t1 = table(1, &[0, 1, 2]);
        let t2 = table(2, &[3, 4]);
        let t3 = table(3, &[0, 5]);
        let t4 = table(4, &[6, 7, 8, 9]);

        let tables: Arc<Vec<Arc<FakeTable>>> =
            Arc::new(vec![t1.clone(), t2.clone(), t3.clone(), t4.clone()]);
        let source: Arc<dyn TableSource<FakeTable>> =
            Arc::new(FixedSource { tables: Some(tables) });

        let index = DiscoveryIndex::new(source, DiscoveryConfig::default());
        let result = index.query(&accounts).unwrap();

        let addresses: Vec<PublicKey> = result.iter().map(|t| t.address()).collect();
        assert_eq!(addresses, vec![key(4), key(1), key(2)]);
    }

    #[test]
    fn score_rejects_tables_at_or_below_min_score() {
        let accounts: Vec<PublicKey> = (1..=2).map(key).collect();
        let low = table(1, &[1]);
        let high = table(2, &[1, 2]);

        let tables: Arc<Vec<Arc<FakeTable>>> = Arc::new(vec![low, high.clone()]);
        let source: Arc<dyn TableSource<FakeTable>> =
            Arc::new(FixedSource { tables: Some(tables) });

        let config = DiscoveryConfig::builder().min_score(1).build();
        let index = DiscoveryIndex::new(source, config);
        let scored = index.score(&index.source.all_tables().unwrap(), &accounts);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].1.address(), high.address());
    }
}
