//! Facet merge: dedup by hash, stable height-descending sort, paginate.
//!
//! All functions here are pure; the orchestrator feeds them whatever the
//! answering tier produced.

use std::collections::HashSet;

use crate::retrieval::types::{FacetBatch, PaginationWindow, TransactionPage};
use crate::transaction::TransactionRecord;

/// Keep the first record seen for each hash, preserving input order.
pub fn dedup_by_hash(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.hash.clone()))
        .collect()
}

/// Height descending; equal heights keep their relative order.
pub fn sort_by_height_desc(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.height.cmp(&a.height));
}

/// `max(unique, sum of facet totals)`, where each facet total is capped at
/// `facet_window`: records past the window are never fetched, so pages
/// beyond it could only ever be empty.
pub fn total_estimate(unique: usize, batches: &[FacetBatch], facet_window: u32) -> u64 {
    let facet_sum: u64 = batches
        .iter()
        .map(|batch| batch.total_or_len().min(facet_window as u64))
        .sum();
    facet_sum.max(unique as u64)
}

/// Slice `[(page-1)*size, page*size)`; out-of-range pages are empty.
pub fn page_slice(records: Vec<TransactionRecord>, page: u32, page_size: u32) -> Vec<TransactionRecord> {
    let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
    records.into_iter().skip(start).take(page_size as usize).collect()
}

/// Merge facet batches (in facet order) into one page. `facet_window` is
/// the most records any facet can be asked for.
pub fn merge_facets(batches: Vec<FacetBatch>, page: u32, page_size: u32, facet_window: u32) -> TransactionPage {
    let merged: Vec<TransactionRecord> = batches
        .iter()
        .flat_map(|batch| batch.records.iter().cloned())
        .collect();
    let mut unique = dedup_by_hash(merged);
    sort_by_height_desc(&mut unique);
    let total = total_estimate(unique.len(), &batches, facet_window);

    TransactionPage {
        records: page_slice(unique, page, page_size),
        pagination: PaginationWindow::new(page, page_size, total),
    }
}

/// A page already sliced by the server. Records are still deduplicated
/// and ordered; the reported total is raised to cover what was returned.
pub fn server_page(records: Vec<TransactionRecord>, total: Option<u64>, page: u32, page_size: u32) -> TransactionPage {
    let mut records = dedup_by_hash(records);
    sort_by_height_desc(&mut records);
    records.truncate(page_size as usize);
    let seen = (page.max(1) as u64 - 1) * page_size as u64 + records.len() as u64;
    let total = total.unwrap_or(0).max(seen);
    TransactionPage {
        records,
        pagination: PaginationWindow::new(page, page_size, total),
    }
}
