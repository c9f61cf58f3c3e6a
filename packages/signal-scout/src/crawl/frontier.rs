//! Crawl frontier: the prioritized set of URLs still to fetch this cycle.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use url::Url;

use crate::canonical::domain_key;
use crate::types::{FetchState, FrontierItem};

/// Why `push` accepted or rejected an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    Duplicate,
    TooDeep,
    DomainQuotaExhausted,
}

struct Entry(FrontierItem);

impl Entry {
    fn key(&self) -> (f32, usize, u64) {
        (self.0.relevancy_score, self.0.depth, self.0.sequence)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Max-heap: higher relevancy first, then shallower, then older.
    fn cmp(&self, other: &Self) -> Ordering {
        let (ra, da, sa) = self.key();
        let (rb, db, sb) = other.key();
        ra.total_cmp(&rb)
            .then_with(|| db.cmp(&da))
            .then_with(|| sb.cmp(&sa))
    }
}

/// Priority queue with depth, per-domain and duplicate admission rules.
pub struct Frontier {
    heap: BinaryHeap<Entry>,
    seen: HashSet<String>,
    dispatched_per_domain: HashMap<String, usize>,
    max_depth: usize,
    max_pages_per_domain: usize,
    next_sequence: u64,
}

impl Frontier {
    pub fn new(max_depth: usize, max_pages_per_domain: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
            dispatched_per_domain: HashMap::new(),
            max_depth,
            max_pages_per_domain,
            next_sequence: 0,
        }
    }

    /// Offer an item. Each URL is admitted at most once per cycle.
    pub fn push(&mut self, mut item: FrontierItem) -> Admission {
        if item.depth > self.max_depth {
            return Admission::TooDeep;
        }
        if self.domain_exhausted(&item.url) {
            return Admission::DomainQuotaExhausted;
        }
        if !self.seen.insert(seen_key(&item.url)) {
            return Admission::Duplicate;
        }
        item.state = FetchState::Queued;
        item.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Entry(item));
        Admission::Queued
    }

    /// Take the best item whose domain still has quota, marking it
    /// `Fetching` and charging its domain. Items for exhausted domains, or
    /// that are no longer queued, are discarded.
    pub fn pop(&mut self) -> Option<FrontierItem> {
        while let Some(Entry(mut item)) = self.heap.pop() {
            if self.domain_exhausted(&item.url) || !item.advance(FetchState::Fetching) {
                continue;
            }
            *self
                .dispatched_per_domain
                .entry(domain_key(&item.url))
                .or_insert(0) += 1;
            return Some(item);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pages dispatched for a domain so far.
    pub fn dispatched(&self, url: &Url) -> usize {
        self.dispatched_per_domain
            .get(&domain_key(url))
            .copied()
            .unwrap_or(0)
    }

    fn domain_exhausted(&self, url: &Url) -> bool {
        self.dispatched(url) >= self.max_pages_per_domain
    }
}

fn seen_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
