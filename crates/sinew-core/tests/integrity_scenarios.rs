//! End-to-end integrity scenarios: seed a store, check, repair, re-check.
//!
//! Each scenario drives the full stack — registry, codecs, resolver,
//! checker, repair engine — against the in-memory reference store.

use sinew_core::check::checker::{CheckOptions, IntegrityChecker};
use sinew_core::check::issue::{IssueKind, Severity};
use sinew_core::codec::RawValue;
use sinew_core::model::{EntityId, EntityRef};
use sinew_core::repair::{RepairEngine, RepairOptions};
use sinew_core::resolve::Resolver;
use sinew_core::schema::defaults;
use sinew_core::schema::Registry;
use sinew_core::store::sqlite::SqliteStore;
use sinew_core::store::EntityStore as _;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn id(raw: u64) -> EntityId {
    EntityId::new(raw).expect("nonzero test id")
}

fn fixture() -> (Registry, SqliteStore) {
    let registry = defaults::registry();
    let store = SqliteStore::open_in_memory().expect("open in-memory store");
    (registry, store)
}

fn native_blob(ids: &[u64]) -> RawValue {
    let mut bytes = u32::try_from(ids.len()).expect("count fits").to_le_bytes().to_vec();
    for raw in ids {
        bytes.extend_from_slice(&raw.to_le_bytes());
    }
    RawValue::Blob(bytes)
}

// ---------------------------------------------------------------------------
// Scenario 1: duplicate + orphan in one native-array list
// ---------------------------------------------------------------------------

#[test]
fn duplicate_and_orphan_detected_then_repaired() {
    let (registry, store) = fixture();
    store.insert_entity("event", id(10)).expect("insert event");
    store.insert_entity("dj", id(5)).expect("insert dj");
    let event = EntityRef::content("event", id(10));
    store
        .write_attribute(&event, "linked_djs", &native_blob(&[5, 5, 999]))
        .expect("write payload");

    let checker = IntegrityChecker::new(&registry, &store);
    let report = checker
        .check_relationship("event_to_dj", &CheckOptions::default())
        .expect("known relationship");

    assert_eq!(report.sources_count, 1);
    assert_eq!(report.issues_count, 2);

    let duplicate = report
        .issues
        .iter()
        .find(|i| i.kind == IssueKind::DuplicateReference)
        .expect("duplicate issue");
    assert_eq!(duplicate.related, Some(id(5)));
    assert_eq!(duplicate.severity, Severity::Warning);

    let orphan = report
        .issues
        .iter()
        .find(|i| i.kind == IssueKind::OrphanedReference)
        .expect("orphan issue");
    assert_eq!(orphan.related, Some(id(999)));
    assert_eq!(orphan.severity, Severity::Error);

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("event_to_dj", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);

    let resolver = Resolver::new(&registry, &store);
    assert_eq!(resolver.related(&event, "event_to_dj"), vec![id(5)]);

    let after = checker
        .check_relationship("event_to_dj", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(after.issues_count, 0);
}

// ---------------------------------------------------------------------------
// Scenario 2: broken bidirectional pair, repair restores symmetry
// ---------------------------------------------------------------------------

#[test]
fn missing_inverse_detected_and_reconnected() {
    let (registry, store) = fixture();
    store.insert_user(id(1)).expect("insert user");
    store.insert_user(id(2)).expect("insert user");
    let follower_list_owner = EntityRef::user(id(1));
    let unlinked = EntityRef::user(id(2));
    store
        .write_attribute(&follower_list_owner, "followers", &RawValue::Text("[2]".into()))
        .expect("write followers");
    store
        .write_attribute(&unlinked, "following", &RawValue::Text("[]".into()))
        .expect("write following");

    let checker = IntegrityChecker::new(&registry, &store);
    let report = checker
        .check_relationship("user_to_followers", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(report.issues_count, 1);
    let issue = &report.issues[0];
    assert_eq!(issue.kind, IssueKind::MissingInverse);
    assert_eq!(issue.severity, Severity::Warning);
    assert_eq!(issue.source, follower_list_owner);
    assert_eq!(issue.related, Some(id(2)));

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("user_to_followers", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);

    let resolver = Resolver::new(&registry, &store);
    assert_eq!(resolver.related(&unlinked, "user_to_following"), vec![id(1)]);
}

/// Bidirectional symmetry property: after a clean repair pass,
/// `(a, b) ∈ followers ⇒ (b, a) ∈ following` for every pair.
#[test]
fn repair_pass_restores_full_bidirectional_symmetry() {
    let (registry, store) = fixture();
    for raw in 1..=4 {
        store.insert_user(id(raw)).expect("insert user");
    }
    // A tangle of half-written links.
    let writes: [(u64, &str); 3] = [(1, "[2,3]"), (2, "[3]"), (3, "[]")];
    for (user, followers) in writes {
        store
            .write_attribute(
                &EntityRef::user(id(user)),
                "followers",
                &RawValue::Text(followers.into()),
            )
            .expect("write followers");
    }

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("user_to_followers", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);

    let resolver = Resolver::new(&registry, &store);
    for follower_owner in 1..=4_u64 {
        let owner_ref = EntityRef::user(id(follower_owner));
        for follower in resolver.related(&owner_ref, "user_to_followers") {
            let follower_ref = EntityRef::user(follower);
            assert!(
                resolver
                    .related(&follower_ref, "user_to_following")
                    .contains(&id(follower_owner)),
                "user {follower} should follow user {follower_owner} after repair"
            );
        }
    }

    let checker = IntegrityChecker::new(&registry, &store);
    let after = checker
        .check_relationship("user_to_followers", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(after.issues_count, 0);
}

// ---------------------------------------------------------------------------
// Scenario 3: wrong concrete type behind a single-reference link
// ---------------------------------------------------------------------------

#[test]
fn invalid_type_detected_and_link_removed() {
    let (registry, store) = fixture();
    store.insert_entity("classified", id(50)).expect("insert classified");
    store.insert_entity("dj", id(7)).expect("insert dj");
    let classified = EntityRef::content("classified", id(50));
    store
        .write_attribute(&classified, "linked_event", &RawValue::Text("7".into()))
        .expect("write link");

    let checker = IntegrityChecker::new(&registry, &store);
    let report = checker
        .check_relationship("classified_to_event", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(report.issues_count, 1);
    let issue = &report.issues[0];
    assert_eq!(issue.kind, IssueKind::InvalidType);
    assert_eq!(issue.expected.as_deref(), Some("event"));
    assert_eq!(issue.actual.as_deref(), Some("dj"));
    // Never also an orphan for the same id.
    assert!(
        !report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::OrphanedReference)
    );

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("classified_to_event", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);

    let resolver = Resolver::new(&registry, &store);
    assert!(resolver.related(&classified, "classified_to_event").is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 4: self-reference gating
// ---------------------------------------------------------------------------

#[test]
fn self_reference_yields_exactly_one_issue() {
    let (registry, store) = fixture();
    store.insert_user(id(3)).expect("insert user");
    let user = EntityRef::user(id(3));
    store
        .write_attribute(&user, "following", &RawValue::Text("[3]".into()))
        .expect("write self link");

    let checker = IntegrityChecker::new(&registry, &store);
    let report = checker
        .check_relationship("user_to_following", &CheckOptions::default())
        .expect("known relationship");

    assert_eq!(report.issues_count, 1);
    let issue = &report.issues[0];
    assert_eq!(issue.kind, IssueKind::SelfReference);
    assert_eq!(issue.severity, Severity::Error);
    assert_eq!(issue.related, Some(id(3)));

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("user_to_following", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);

    let resolver = Resolver::new(&registry, &store);
    assert!(resolver.related(&user, "user_to_following").is_empty());
}

// ---------------------------------------------------------------------------
// Deletion leaves dangling links for the audit cycle to find
// ---------------------------------------------------------------------------

#[test]
fn deleting_a_target_creates_an_orphan_the_cycle_repairs() {
    let (registry, store) = fixture();
    store.insert_entity("event", id(10)).expect("insert event");
    store.insert_entity("dj", id(5)).expect("insert dj");
    let event = EntityRef::content("event", id(10));

    let resolver = Resolver::new(&registry, &store);
    assert!(resolver.connect(&event, id(5), "event_to_dj"));

    // Host-side deletion does not touch attributes.
    store.delete_entity(id(5)).expect("delete dj");
    assert_eq!(resolver.related(&event, "event_to_dj"), vec![id(5)]);

    let checker = IntegrityChecker::new(&registry, &store);
    let report = checker
        .check_relationship("event_to_dj", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(report.issues_count, 1);
    assert_eq!(report.issues[0].kind, IssueKind::OrphanedReference);

    let engine = RepairEngine::new(&registry, &store);
    let repair = engine
        .repair_relationship("event_to_dj", &RepairOptions::default())
        .expect("known relationship");
    assert!(repair.failed.is_empty(), "failed: {:?}", repair.failed);
    assert!(resolver.related(&event, "event_to_dj").is_empty());
}

// ---------------------------------------------------------------------------
// Dry-run equivalence across a mixed population
// ---------------------------------------------------------------------------

#[test]
fn dry_run_matches_live_decisions_across_mixed_issues() {
    let (registry, store) = fixture();
    store.insert_entity("event", id(10)).expect("insert event");
    store.insert_entity("event", id(11)).expect("insert event");
    store.insert_entity("dj", id(5)).expect("insert dj");
    store
        .write_attribute(
            &EntityRef::content("event", id(10)),
            "linked_djs",
            &native_blob(&[5, 5, 999]),
        )
        .expect("write");
    store
        .write_attribute(
            &EntityRef::content("event", id(11)),
            "linked_djs",
            &native_blob(&[5]),
        )
        .expect("write");

    let engine = RepairEngine::new(&registry, &store);
    let dry = engine
        .repair_relationship(
            "event_to_dj",
            &RepairOptions {
                dry_run: true,
                limit: 0,
            },
        )
        .expect("known relationship");

    // Nothing was written: the same issues are still present.
    let checker = IntegrityChecker::new(&registry, &store);
    let still_dirty = checker
        .check_relationship("event_to_dj", &CheckOptions::default())
        .expect("known relationship");
    assert_eq!(still_dirty.issues_count, 2);

    let live = engine
        .repair_relationship("event_to_dj", &RepairOptions::default())
        .expect("known relationship");

    let describe = |r: &sinew_core::repair::RepairReport| {
        r.repaired
            .iter()
            .map(|e| format!("{}:{:?}", e.issue.kind, e.action))
            .collect::<Vec<_>>()
    };
    assert_eq!(describe(&dry), describe(&live));
    assert_eq!(dry.failed.len(), live.failed.len());
}

// ---------------------------------------------------------------------------
// Whole-schema pass over a seeded site
// ---------------------------------------------------------------------------

#[test]
fn check_all_folds_severities_and_skips_reverse_views() {
    let (registry, store) = fixture();
    store.insert_entity("event", id(10)).expect("insert");
    store.insert_entity("dj", id(5)).expect("insert");
    store.insert_user(id(1)).expect("insert");
    store
        .write_attribute(
            &EntityRef::content("event", id(10)),
            "linked_djs",
            &native_blob(&[5, 5]),
        )
        .expect("write"); // one duplicate warning
    store
        .write_attribute(
            &EntityRef::user(id(1)),
            "bookmarks",
            &RawValue::Text("[404]".into()),
        )
        .expect("write"); // one orphan error

    let checker = IntegrityChecker::new(&registry, &store);
    let summary = checker.check_all(&CheckOptions::default());

    assert_eq!(summary.total_issues, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.warnings, 1);
    assert_eq!(summary.info, 0);

    // One report per forward definition — derived reverse views are not
    // primary sides and contribute no reports.
    assert_eq!(summary.relationships.len(), registry.len());
    let names: Vec<_> = summary
        .relationships
        .iter()
        .map(|r| r.relationship.as_str())
        .collect();
    assert!(!names.iter().any(|n| n.ends_with("_sources")));
}
