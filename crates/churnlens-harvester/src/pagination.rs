//! Explicit pagination state for one harvest call.
//!
//! The harvester never keeps cursor state in captured variables: everything
//! it needs to resume (the continuation token, ids already delivered,
//! whether newest-first ordering has held so far) lives in a [`PageCursor`]
//! that the caller owns and the harvester advances one page at a time.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use churnlens_core::RawReview;

use crate::types::{ContinuationToken, ReviewPage};

#[derive(Debug, Default)]
pub struct PageCursor {
    token: Option<ContinuationToken>,
    seen: HashSet<String>,
    pages_fetched: usize,
    exhausted: bool,
    last_at: Option<NaiveDateTime>,
    out_of_order: bool,
}

impl PageCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to request the next page with; `None` before the first page.
    #[must_use]
    pub fn token(&self) -> Option<&ContinuationToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// `true` once an empty page or a page without a next token was consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// `true` while every item so far has been no newer than its predecessor.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !self.out_of_order
    }

    #[must_use]
    pub fn unique_seen(&self) -> usize {
        self.seen.len()
    }

    /// Consume a fetched page: moves the token forward and returns only the
    /// reviews whose ids have not been delivered earlier in this call.
    pub fn advance(&mut self, page: ReviewPage) -> Vec<RawReview> {
        self.pages_fetched += 1;
        if page.items.is_empty() || page.next.is_none() {
            self.exhausted = true;
        }
        self.token = page.next;

        let mut fresh = Vec::with_capacity(page.items.len());
        for review in page.items {
            if !self.seen.insert(review.id.clone()) {
                tracing::debug!(review_id = %review.id, "dropping duplicate from overlapping page");
                continue;
            }
            self.observe_order(review.at);
            fresh.push(review);
        }
        fresh
    }

    fn observe_order(&mut self, at: NaiveDateTime) {
        if let Some(prev) = self.last_at {
            if at > prev && !self.out_of_order {
                tracing::warn!(
                    previous = %prev,
                    current = %at,
                    "review source broke newest-first ordering; disabling early stop"
                );
                self.out_of_order = true;
            }
        }
        self.last_at = Some(at);
    }
}
