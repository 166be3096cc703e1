use super::*;

use crate::{fixtures::post, lifecycle::RejectionCause};

fn ids(collection: &ContentCollection) -> Vec<&str> {
    collection.items.iter().map(|item| item.id.as_str()).collect()
}

fn loaded(items: Vec<ContentItem>) -> ContentCollection {
    let mut collection = ContentCollection::default();
    collection.requested(OperationKind::ListPosts);
    collection.listed(1, items, false);
    collection
}

#[test]
fn list_replaces_items_wholesale() {
    let mut collection = loaded(vec![post("x", "X"), post("y", "Y")]);
    collection.selected = Some(post("z", "Z"));

    collection.requested(OperationKind::ListPosts);
    assert_eq!(collection.status, SyncStatus::Loading);
    collection.listed(2, vec![post("a", "A"), post("b", "B"), post("c", "C")], false);

    assert_eq!(ids(&collection), vec!["a", "b", "c"]);
    assert_eq!(collection.status, SyncStatus::Ready);
    assert_eq!(
        collection.selected.as_ref().map(|item| item.id.as_str()),
        Some("z")
    );
}

#[test]
fn create_prepends_newest_first() {
    let mut collection = loaded(vec![post("a", "A"), post("b", "B")]);
    collection.requested(OperationKind::CreatePost);
    collection.created(post("c", "C"));
    assert_eq!(ids(&collection), vec!["c", "a", "b"]);
}

#[test]
fn update_preserves_position_and_refreshes_selection() {
    let mut collection = loaded(vec![post("a", "A"), post("b", "B"), post("c", "C")]);
    collection.selected = Some(post("b", "B"));

    let mut edited = post("b", "B edited");
    edited.updated_at = edited.created_at + chrono::Duration::minutes(5);
    collection.requested(OperationKind::UpdatePost);
    collection.updated(edited.clone());

    assert_eq!(ids(&collection), vec!["a", "b", "c"]);
    assert_eq!(collection.items[1], edited);
    assert_eq!(collection.selected.as_ref(), Some(&edited));
    assert!(edited.was_edited());
}

#[test]
fn update_of_unknown_id_is_a_silent_no_op() {
    let mut collection = loaded(vec![post("a", "A")]);
    let before = collection.items.clone();
    collection.requested(OperationKind::UpdatePost);
    collection.updated(post("ghost", "Ghost"));

    assert_eq!(collection.items, before);
    assert!(collection.last_error.is_none());
    assert_eq!(collection.status, SyncStatus::Ready);
}

#[test]
fn update_reaches_selection_missing_from_list() {
    let mut collection = ContentCollection::default();
    collection.requested(OperationKind::FetchPost);
    collection.fetched(post("solo", "Solo"));

    collection.requested(OperationKind::UpdatePost);
    collection.updated(post("solo", "Solo v2"));

    assert!(collection.items.is_empty());
    assert_eq!(
        collection.selected.as_ref().map(|item| item.title.as_str()),
        Some("Solo v2")
    );
}

#[test]
fn fetch_does_not_merge_into_list() {
    let mut collection = loaded(vec![post("a", "A")]);
    collection.requested(OperationKind::FetchPost);
    collection.fetched(post("a", "A newer"));

    assert_eq!(collection.items[0].title, "A");
    assert_eq!(
        collection.selected.as_ref().map(|item| item.title.as_str()),
        Some("A newer")
    );
}

#[test]
fn delete_removes_item_and_clears_matching_selection() {
    let mut collection = loaded(vec![post("a", "A"), post("b", "B")]);
    collection.selected = Some(post("b", "B"));

    collection.requested(OperationKind::DeletePost);
    collection.deleted(&PostId::new("b"));

    assert_eq!(ids(&collection), vec!["a"]);
    assert!(collection.selected.is_none());
}

#[test]
fn delete_keeps_unrelated_selection() {
    let mut collection = loaded(vec![post("a", "A"), post("b", "B")]);
    collection.selected = Some(post("a", "A"));
    collection.requested(OperationKind::DeletePost);
    collection.deleted(&PostId::new("b"));
    assert!(collection.selected.is_some());
}

#[test]
fn rejection_keeps_items_and_records_error() {
    let mut collection = loaded(vec![post("a", "A")]);
    collection.requested(OperationKind::CreatePost);
    collection.rejected(&Rejection {
        message: "Title is required".into(),
        cause: RejectionCause::Remote,
    });

    assert_eq!(ids(&collection), vec!["a"]);
    assert_eq!(collection.status, SyncStatus::Failed);
    assert_eq!(collection.last_error.as_deref(), Some("Title is required"));

    collection.requested(OperationKind::ListPosts);
    assert!(collection.last_error.is_none());
}

#[test]
fn status_stays_loading_until_every_invocation_settles() {
    let mut collection = ContentCollection::default();
    collection.requested(OperationKind::ListPosts);
    collection.requested(OperationKind::ListPosts);
    collection.listed(1, vec![post("a", "A")], false);
    assert_eq!(collection.status, SyncStatus::Loading);
    assert!(collection.is_loading());
    collection.listed(2, vec![post("b", "B")], false);
    assert_eq!(collection.status, SyncStatus::Ready);
}

#[test]
fn out_of_order_lists_overwrite_unless_guarded() {
    let mut unguarded = ContentCollection::default();
    unguarded.requested(OperationKind::ListPosts);
    unguarded.requested(OperationKind::ListPosts);
    unguarded.listed(2, vec![post("new", "New")], false);
    unguarded.listed(1, vec![post("old", "Old")], false);
    assert_eq!(ids(&unguarded), vec!["old"]);

    let mut guarded = ContentCollection::default();
    guarded.requested(OperationKind::ListPosts);
    guarded.requested(OperationKind::ListPosts);
    guarded.listed(2, vec![post("new", "New")], true);
    guarded.listed(1, vec![post("old", "Old")], true);
    assert_eq!(ids(&guarded), vec!["new"]);
    assert_eq!(guarded.status, SyncStatus::Ready);
}

#[test]
fn pagination_math() {
    let items: Vec<u32> = (0..13).collect();
    let pagination = Pagination::new(6);

    assert_eq!(pagination.page_count(items.len()), 3);
    assert_eq!(pagination.page(&items, 0), &items[0..6]);
    assert_eq!(pagination.page(&items, 2), &items[12..13]);
    assert!(pagination.page(&items, 3).is_empty());
    assert_eq!(pagination.window(&items, 10), &items[10..13]);
    assert_eq!(pagination.page_count(0), 0);
    assert_eq!(Pagination::new(0).page_size(), 1);
}

#[test]
fn summary_is_prefix_with_ellipsis_only_when_truncated() {
    assert_eq!(derive_summary("Hello world", 150), "Hello world");
    assert_eq!(derive_summary("Hello world", 5), "Hello...");
    assert_eq!(derive_summary("héllo wörld", 4), "héll...");
    assert_eq!(derive_summary("", 10), "");
}

#[test]
fn draft_uses_explicit_summary_when_given() {
    let derived = PostDraft::new("Hi", "Hello world").into_request(5);
    assert_eq!(derived.excerpt, "Hello...");
    assert_eq!(derived.content, "Hello world");

    let explicit = PostDraft::new("Hi", "Hello world")
        .with_summary("custom")
        .into_request(5);
    assert_eq!(explicit.excerpt, "custom");
}

#[test]
fn tags_are_trimmed_and_empties_dropped() {
    assert_eq!(
        parse_tags(" rust, async ,,rust , "),
        vec!["rust", "async", "rust"]
    );
    assert!(parse_tags("").is_empty());
}
