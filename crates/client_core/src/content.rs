//! Local mirror of the remote post collection plus the single post being viewed.

use shared::{
    domain::{ContentItem, PostId},
    protocol::NewPost,
};
use tracing::debug;

use crate::lifecycle::{OperationKind, Rejection};

const SUMMARY_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A post as authored locally, before the backend has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn into_request(self, summary_len: usize) -> NewPost {
        let excerpt = self
            .summary
            .unwrap_or_else(|| derive_summary(&self.body, summary_len));
        NewPost {
            title: self.title,
            content: self.body,
            excerpt,
            tags: self.tags,
        }
    }
}

/// First `len` characters of `body`, with an ellipsis when anything was cut.
pub fn derive_summary(body: &str, len: usize) -> String {
    match body.char_indices().nth(len) {
        Some((cut, _)) => format!("{}{SUMMARY_ELLIPSIS}", &body[..cut]),
        None => body.to_string(),
    }
}

/// Splits a comma-separated tag field, trimming each tag and dropping empties.
/// Duplicates and authoring order are kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read-side paging over `items`. Never feeds back into the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_size: usize,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }

    pub fn offset_of(&self, page: usize) -> usize {
        page.saturating_mul(self.page_size)
    }

    /// `items[offset .. offset + page_size]`, clamped to the collection.
    pub fn window<'a, T>(&self, items: &'a [T], offset: usize) -> &'a [T] {
        let start = offset.min(items.len());
        let end = offset.saturating_add(self.page_size).min(items.len());
        &items[start..end]
    }

    pub fn page<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        self.window(items, self.offset_of(page))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentCollection {
    /// Server order; creates are prepended so the newest comes first.
    pub items: Vec<ContentItem>,
    /// Post under detail view. May be absent from `items`.
    pub selected: Option<ContentItem>,
    pub status: SyncStatus,
    pub last_error: Option<String>,
    in_flight: usize,
    last_list_seq: u64,
}

impl ContentCollection {
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn find(&self, id: &PostId) -> Option<&ContentItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn requested(&mut self, kind: OperationKind) {
        if kind.is_session() {
            return;
        }
        self.in_flight += 1;
        self.status = SyncStatus::Loading;
        self.last_error = None;
    }

    /// Replaces `items` wholesale. With `discard_stale`, a list requested
    /// before the last applied one is dropped instead.
    pub fn listed(&mut self, seq: u64, items: Vec<ContentItem>, discard_stale: bool) {
        self.settle(true);
        if discard_stale && seq < self.last_list_seq {
            debug!(seq, applied = self.last_list_seq, "discarding stale list result");
            return;
        }
        self.last_list_seq = self.last_list_seq.max(seq);
        self.items = items;
    }

    /// Sets the detail view. A same-id entry in `items` is left alone until
    /// the next list.
    pub fn fetched(&mut self, item: ContentItem) {
        self.settle(true);
        self.selected = Some(item);
    }

    pub fn created(&mut self, item: ContentItem) {
        self.settle(true);
        self.items.insert(0, item);
    }

    pub fn updated(&mut self, item: ContentItem) {
        self.settle(true);
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => debug!(post_id = %item.id, "updated post is not in the local list"),
        }
        if self.selected.as_ref().is_some_and(|selected| selected.id == item.id) {
            self.selected = Some(item);
        }
    }

    pub fn deleted(&mut self, id: &PostId) {
        self.settle(true);
        self.items.retain(|item| &item.id != id);
        if self.selected.as_ref().is_some_and(|selected| &selected.id == id) {
            self.selected = None;
        }
    }

    pub fn rejected(&mut self, rejection: &Rejection) {
        self.settle(false);
        self.last_error = Some(rejection.message.clone());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn settle(&mut self, fulfilled: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.status = if self.in_flight > 0 {
            SyncStatus::Loading
        } else if fulfilled {
            SyncStatus::Ready
        } else {
            SyncStatus::Failed
        };
    }
}

#[cfg(test)]
#[path = "tests/content_tests.rs"]
mod tests;
