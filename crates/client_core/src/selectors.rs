//! Read accessors for collaborators, meant to be passed to [`crate::Engine::select`].

use shared::domain::{ContentItem, Identity, PostId};

use crate::{
    content::{Pagination, SyncStatus},
    engine::AppState,
    session::SessionStatus,
};

pub fn is_authenticated(state: &AppState) -> bool {
    state.session.is_authenticated()
}

pub fn session_status(state: &AppState) -> SessionStatus {
    state.session.status
}

pub fn current_identity(state: &AppState) -> Option<&Identity> {
    state.session.identity.as_ref()
}

pub fn session_error(state: &AppState) -> Option<&str> {
    state.session.last_error.as_deref()
}

pub fn authored(state: &AppState) -> &[ContentItem] {
    &state.session.authored
}

pub fn items(state: &AppState) -> &[ContentItem] {
    &state.content.items
}

pub fn selected(state: &AppState) -> Option<&ContentItem> {
    state.content.selected.as_ref()
}

pub fn content_status(state: &AppState) -> SyncStatus {
    state.content.status
}

pub fn content_error(state: &AppState) -> Option<&str> {
    state.content.last_error.as_deref()
}

pub fn is_loading(state: &AppState) -> bool {
    state.session.is_loading() || state.content.is_loading()
}

/// Looks in the list first, then at the detail view.
pub fn item<'a>(state: &'a AppState, id: &PostId) -> Option<&'a ContentItem> {
    state
        .content
        .find(id)
        .or_else(|| selected(state).filter(|item| &item.id == id))
}

pub fn is_author(state: &AppState, item: &ContentItem) -> bool {
    is_authenticated(state)
        && current_identity(state).is_some_and(|identity| identity.id == item.author_ref.id)
}

pub fn page_count(state: &AppState, pagination: Pagination) -> usize {
    pagination.page_count(state.content.items.len())
}

pub fn page(state: &AppState, pagination: Pagination, index: usize) -> &[ContentItem] {
    pagination.page(&state.content.items, index)
}

#[cfg(test)]
#[path = "tests/selectors_tests.rs"]
mod tests;
