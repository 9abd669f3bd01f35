use crate::push::EntityTracker;

#[derive(Debug, Clone, PartialEq)]
struct Doc {
    title: &'static str,
    version: u64,
}

fn doc(title: &'static str, version: u64) -> Doc {
    Doc { title, version }
}

fn entries(docs: &[(&str, Doc)]) -> Vec<(String, Doc)> {
    docs.iter()
        .map(|(key, doc)| (key.to_string(), doc.clone()))
        .collect()
}

#[test]
fn given_empty_tracker_when_entities_loaded_then_all_are_changed() {
    let mut tracker = EntityTracker::new();

    let delta = tracker.diff(
        entries(&[("a", doc("A", 1)), ("b", doc("B", 1))]),
        |d| d.version,
    );

    assert_eq!(delta.changed_len(), 2);
    assert!(delta.removed.is_none(), "nothing to remove on first load");
    assert_eq!(tracker.len(), 2);
}

/// **VALUE**: Unchanged versions never appear in a delta.
#[test]
fn given_unchanged_versions_when_diffed_then_delta_is_empty() {
    let mut tracker = EntityTracker::new();
    tracker.diff(entries(&[("a", doc("A", 1))]), |d| d.version);

    let delta = tracker.diff(entries(&[("a", doc("A", 1))]), |d| d.version);

    assert!(delta.is_empty());
}

/// **VALUE**: A field change without a version bump is skipped.
#[test]
fn given_field_change_without_version_bump_when_diffed_then_change_is_skipped() {
    let mut tracker = EntityTracker::new();
    tracker.diff(entries(&[("a", doc("A", 3))]), |d| d.version);

    let delta = tracker.diff(entries(&[("a", doc("renamed", 3))]), |d| d.version);

    assert!(delta.is_empty());
}

#[test]
fn given_version_bump_when_diffed_then_only_bumped_entity_is_changed() {
    let mut tracker = EntityTracker::new();
    tracker.diff(
        entries(&[("a", doc("A", 1)), ("b", doc("B", 1))]),
        |d| d.version,
    );

    let delta = tracker.diff(
        entries(&[("a", doc("A2", 2)), ("b", doc("B", 1))]),
        |d| d.version,
    );

    let changed = delta.changed.expect("one entity changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed["a"].title, "A2");
    assert!(delta.removed.is_none());
}

#[test]
fn given_lower_version_when_diffed_then_entity_is_not_changed() {
    let mut tracker = EntityTracker::new();
    tracker.diff(entries(&[("a", doc("A", 5))]), |d| d.version);

    let delta = tracker.diff(entries(&[("a", doc("A", 4))]), |d| d.version);

    assert!(delta.is_empty());
}

#[test]
fn given_missing_key_when_diffed_then_key_is_removed() {
    let mut tracker = EntityTracker::new();
    tracker.diff(
        entries(&[("a", doc("A", 1)), ("b", doc("B", 1))]),
        |d| d.version,
    );

    let delta = tracker.diff(entries(&[("a", doc("A", 1))]), |d| d.version);

    assert!(delta.changed.is_none());
    assert_eq!(delta.removed, Some(vec!["b".to_string()]));
    assert_eq!(tracker.len(), 1);
}

/// **VALUE**: A full reset lists every old key as removed and every new key as changed.
#[test]
fn given_full_reset_when_diffed_then_old_keys_removed_and_new_keys_changed() {
    let mut tracker = EntityTracker::new();
    tracker.diff(
        entries(&[("a", doc("A", 1)), ("b", doc("B", 1))]),
        |d| d.version,
    );

    let delta = tracker.diff(
        entries(&[("c", doc("C", 1)), ("d", doc("D", 1))]),
        |d| d.version,
    );

    assert_eq!(delta.changed_len(), 2);
    assert_eq!(delta.removed_len(), 2);
    assert_eq!(delta.removed, Some(vec!["a".to_string(), "b".to_string()]));
}
