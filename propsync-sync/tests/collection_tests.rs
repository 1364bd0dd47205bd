use pretty_assertions::assert_eq;
use propsync_query::{Filters, QueryState, SortDirection, SortKey};
use propsync_sync::{ApplyOutcome, ListingCache, LiveCollection};
use propsync_types::{EventEnvelope, Property, PropertyId, PropertyKind, PropertyStatus};

fn listing(id: u64, name: &str, status: PropertyStatus, price: f64) -> Property {
    Property {
        id: PropertyId::new(id),
        name: name.to_string(),
        kind: PropertyKind::Rental,
        owner: "Dana Reyes".to_string(),
        price,
        status,
        latitude: 40.0,
        longitude: -73.0,
        description: None,
        bedrooms: Some(2),
        bathrooms: Some(1.0),
        square_feet: None,
        address: Some(format!("{id} Main St")),
        images: None,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

fn available(id: u64, name: &str) -> Property {
    listing(id, name, PropertyStatus::Available, 1000.0)
}

fn ids(items: &[Property]) -> Vec<u64> {
    items.iter().map(|p| p.id.get()).collect()
}

fn seeded(count: u64) -> LiveCollection {
    let collection = LiveCollection::default();
    collection.replace_all((1..=count).map(|i| available(i, &format!("Unit {i:02}"))).collect());
    collection
}

// ── ListingCache ────────────────────────────────────────────────

#[test]
fn cache_replace_all_drops_duplicate_ids() {
    let mut cache = ListingCache::new();
    cache.replace_all(vec![available(1, "A"), available(2, "B"), available(1, "A2")]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(PropertyId::new(1)).unwrap().name, "A2");
    assert_eq!(ids(cache.as_slice()), vec![1, 2]);
    assert!(cache.is_consistent());
}

#[test]
fn cache_upsert_inserts_at_front_and_replaces_in_place() {
    let mut cache = ListingCache::new();
    cache.replace_all(vec![available(1, "A"), available(2, "B")]);

    assert_eq!(cache.upsert(available(3, "C")), ApplyOutcome::Inserted);
    assert_eq!(
        cache.ids(),
        vec![PropertyId::new(3), PropertyId::new(1), PropertyId::new(2)]
    );

    assert_eq!(cache.upsert(available(1, "A*")), ApplyOutcome::Replaced);
    assert_eq!(ids(cache.as_slice()), vec![3, 1, 2]);
    assert_eq!(cache.get(PropertyId::new(1)).unwrap().name, "A*");
}

#[test]
fn cache_remove_unknown_is_unchanged() {
    let mut cache = ListingCache::new();
    cache.replace_all(vec![available(1, "A")]);
    assert_eq!(cache.remove(PropertyId::new(9)), ApplyOutcome::Unchanged);
    assert!(!ApplyOutcome::Unchanged.changed());
    assert_eq!(cache.remove(PropertyId::new(1)), ApplyOutcome::Removed);
    assert!(cache.is_empty());
}

// ── Patches ─────────────────────────────────────────────────────

#[test]
fn create_twice_keeps_one_entry_with_second_payload() {
    let collection = LiveCollection::default();
    assert_eq!(collection.apply_create(available(7, "First")), ApplyOutcome::Inserted);
    assert_eq!(collection.apply_create(available(7, "Second")), ApplyOutcome::Replaced);

    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get(PropertyId::new(7)).unwrap().name, "Second");
}

#[test]
fn update_for_unknown_id_inserts() {
    let collection = seeded(2);
    assert_eq!(collection.apply_update(available(5, "New")), ApplyOutcome::Inserted);
    assert_eq!(collection.len(), 3);
}

#[test]
fn delete_for_unknown_id_changes_nothing() {
    let collection = seeded(3);
    let before = collection.snapshot();
    let ghost = available(99, "Ghost");

    let outcome = collection.apply_envelope(&EventEnvelope::PropertyDeleted(ghost));

    assert_eq!(outcome, ApplyOutcome::Unchanged);
    assert_eq!(collection.snapshot(), before);
}

#[test]
fn connection_envelope_is_ignored() {
    let collection = seeded(1);
    let revision = collection.revision();
    let outcome = collection.apply_envelope(&EventEnvelope::Connection { message: None });
    assert_eq!(outcome, ApplyOutcome::Unchanged);
    assert_eq!(collection.revision(), revision);
}

#[test]
fn update_that_fails_the_active_filter_leaves_the_page() {
    let collection = LiveCollection::default();
    collection.replace_all(vec![available(1, "Harbor View")]);
    collection.set_filters(Filters {
        status: Some(PropertyStatus::Available),
        ..Filters::default()
    });
    assert_eq!(ids(&collection.derived().items), vec![1]);

    let occupied = listing(1, "Harbor View", PropertyStatus::Occupied, 1000.0);
    collection.apply_envelope(&EventEnvelope::PropertyUpdated(occupied));

    let page = collection.derived();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(collection.len(), 1);
}

#[test]
fn delete_on_last_page_clamps_the_page() {
    let collection = seeded(11);
    assert!(collection.go_to_page(2));
    assert_eq!(ids(&collection.derived().items), vec![11]);

    collection.apply_delete(PropertyId::new(11));

    let view = collection.view();
    assert_eq!(view.query.page, 1);
    assert_eq!(view.page.page, 1);
    assert_eq!(view.page.items.len(), 10);
    assert_eq!(view.page.total_pages, 1);
}

#[test]
fn page_stays_in_range_when_everything_is_deleted() {
    let collection = seeded(3);
    for id in 1..=3 {
        collection.apply_delete(PropertyId::new(id));
    }
    let page = collection.derived();
    assert_eq!(page.page, 1);
    assert!(page.is_empty());
    assert_eq!(page.total_pages, 0);
}

// ── Selected listing ────────────────────────────────────────────

#[test]
fn selected_listing_follows_updates_and_deletes() {
    let collection = seeded(2);
    collection.select(available(1, "Unit 01"));

    collection.apply_envelope(&EventEnvelope::PropertyUpdated(available(1, "Renamed")));
    assert_eq!(collection.selected().unwrap().name, "Renamed");

    collection.apply_envelope(&EventEnvelope::PropertyUpdated(available(2, "Other")));
    assert_eq!(collection.selected().unwrap().name, "Renamed");

    collection.apply_envelope(&EventEnvelope::PropertyDeleted(available(1, "Renamed")));
    assert!(collection.selected().is_none());
}

#[test]
fn clear_selected() {
    let collection = seeded(1);
    collection.select(available(1, "Unit 01"));
    collection.clear_selected();
    assert_eq!(collection.view().selected, None);
}

// ── Navigation ──────────────────────────────────────────────────

#[test]
fn search_and_filters_reset_the_page_but_sorting_does_not() {
    let collection = seeded(25);
    assert!(collection.go_to_page(3));

    collection.set_sorting(SortKey::Price, SortDirection::Desc);
    assert_eq!(collection.query().page, 3);

    collection.set_search("unit");
    assert_eq!(collection.query().page, 1);

    assert!(collection.go_to_page(2));
    collection.set_filters(Filters {
        min_price: Some(500.0),
        ..Filters::default()
    });
    assert_eq!(collection.query().page, 1);
}

#[test]
fn kind_and_status_filters_change_one_field_and_reset_the_page() {
    let collection = LiveCollection::default();
    let mut listings: Vec<Property> = (1..=30)
        .map(|i| available(i, &format!("Unit {i:02}")))
        .collect();
    for listing in listings.iter_mut().filter(|p| p.id.get() % 3 == 0) {
        listing.kind = PropertyKind::Sale;
        listing.status = PropertyStatus::Sold;
    }
    collection.replace_all(listings);
    collection.set_filters(Filters {
        min_price: Some(500.0),
        ..Filters::default()
    });

    assert!(collection.go_to_page(2));
    collection.set_kind_filter(Some(PropertyKind::Rental));
    let query = collection.query();
    assert_eq!(query.page, 1);
    assert_eq!(query.filters.kind, Some(PropertyKind::Rental));
    assert_eq!(query.filters.min_price, Some(500.0));
    assert_eq!(collection.derived().total_count, 20);

    assert!(collection.go_to_page(2));
    collection.set_kind_filter(None);
    collection.set_status_filter(Some(PropertyStatus::Sold));
    let query = collection.query();
    assert_eq!(query.page, 1);
    assert_eq!(query.filters.kind, None);
    assert_eq!(query.filters.status, Some(PropertyStatus::Sold));
    assert_eq!(query.filters.min_price, Some(500.0));
    assert_eq!(collection.derived().total_count, 10);

    collection.set_status_filter(None);
    assert_eq!(collection.derived().total_count, 30);
}

#[test]
fn go_to_page_rejects_out_of_range() {
    let collection = seeded(15);
    assert!(!collection.go_to_page(0));
    assert!(!collection.go_to_page(3));
    assert_eq!(collection.query().page, 1);
    assert!(collection.go_to_page(2));
    assert_eq!(collection.derived().items.len(), 5);
}

#[test]
fn next_and_previous_stop_at_the_ends() {
    let collection = seeded(21);
    assert!(!collection.previous_page());
    assert!(collection.next_page());
    assert!(collection.next_page());
    assert!(!collection.next_page());
    assert_eq!(collection.derived().page, 3);
    assert!(collection.previous_page());
    assert_eq!(collection.derived().page, 2);
}

#[test]
fn page_size_change_clamps_the_page() {
    let collection = seeded(30);
    assert!(collection.go_to_page(3));
    collection.set_page_size(15);
    assert_eq!(collection.derived().page, 2);

    collection.set_page_size(0);
    assert_eq!(collection.query().page_size, 1);
}

#[test]
fn clear_filters_restores_defaults_but_keeps_page_size() {
    let collection = seeded(5);
    collection.set_page_size(2);
    collection.set_search("unit 03");
    collection.set_sorting(SortKey::Price, SortDirection::Desc);
    assert_eq!(collection.derived().total_count, 1);

    collection.clear_filters();

    let query = collection.query();
    assert_eq!(
        query,
        QueryState {
            page_size: 2,
            ..QueryState::default()
        }
    );
    assert_eq!(collection.derived().total_count, 5);
}

#[test]
fn full_fetch_adopts_server_page() {
    let collection = LiveCollection::default();
    let listings = (1..=30).map(|i| available(i, &format!("Unit {i:02}"))).collect();
    collection.replace_all_with_page(listings, 2);
    let page = collection.derived();
    assert_eq!(page.page, 2);
    assert_eq!(ids(&page.items), (11..=20).collect::<Vec<_>>());
}

#[test]
fn view_is_consistent() {
    let collection = seeded(12);
    collection.apply_create(available(13, "Unit 13"));
    let view = collection.view();
    assert_eq!(view.cached, 13);
    assert_eq!(view.page.total_count, 13);
    assert_eq!(view.page.total_pages, 2);
    assert_eq!(view.revision, collection.revision());
}

#[tokio::test]
async fn changes_are_published() {
    let collection = seeded(1);
    let mut changes = collection.changes();
    let seen = *changes.borrow_and_update();

    collection.apply_create(available(2, "Unit 02"));

    changes.changed().await.unwrap();
    assert!(*changes.borrow() > seen);
}

// ── Properties ──────────────────────────────────────────────────

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Create(u64, bool),
        Update(u64, bool),
        Delete(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..12, any::<bool>()).prop_map(|(id, a)| Op::Create(id, a)),
            (0u64..12, any::<bool>()).prop_map(|(id, a)| Op::Update(id, a)),
            (0u64..12).prop_map(Op::Delete),
        ]
    }

    fn status(available: bool) -> PropertyStatus {
        if available {
            PropertyStatus::Available
        } else {
            PropertyStatus::Occupied
        }
    }

    proptest! {
        #[test]
        fn no_sequence_produces_duplicate_ids(ops in prop::collection::vec(op(), 0..64)) {
            let collection = LiveCollection::default();
            for op in ops {
                let envelope = match op {
                    Op::Create(id, a) => EventEnvelope::PropertyCreated(listing(id, "x", status(a), 1.0)),
                    Op::Update(id, a) => EventEnvelope::PropertyUpdated(listing(id, "x", status(a), 1.0)),
                    Op::Delete(id) => EventEnvelope::PropertyDeleted(listing(id, "x", status(true), 1.0)),
                };
                collection.apply_envelope(&envelope);

                let mut seen = std::collections::HashSet::new();
                for p in collection.snapshot() {
                    prop_assert!(seen.insert(p.id));
                }
            }
        }

        #[test]
        fn applying_an_envelope_twice_is_idempotent(ops in prop::collection::vec(op(), 1..32)) {
            let once = LiveCollection::default();
            let twice = LiveCollection::default();
            for op in ops {
                let envelope = match op {
                    Op::Create(id, a) => EventEnvelope::PropertyCreated(listing(id, "x", status(a), 1.0)),
                    Op::Update(id, a) => EventEnvelope::PropertyUpdated(listing(id, "y", status(a), 2.0)),
                    Op::Delete(id) => EventEnvelope::PropertyDeleted(listing(id, "z", status(true), 3.0)),
                };
                once.apply_envelope(&envelope);
                twice.apply_envelope(&envelope);
                twice.apply_envelope(&envelope);
            }
            prop_assert_eq!(once.snapshot(), twice.snapshot());
            prop_assert_eq!(once.derived(), twice.derived());
        }
    }
}
