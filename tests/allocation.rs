mod common;

use common::{admin_json_request, admin_request, guest_json_request, guest_request, TestServer};
use http::{Method, StatusCode};
use partyserver::db;
use partyserver::error::{is_trigger_rejection, AppError, CAPACITY_CONFLICT_MARKER, ITEM_TYPE_FULL};
use partyserver::models::selection::{SelectItemType, Selection};
use sqlx::SqlitePool;
use serde_json::json;

fn selection_uri(party_id: &str) -> String {
    format!("/api/v1/parties/{party_id}/selection")
}

fn pick(item_type_id: &str, note: Option<&str>) -> SelectItemType {
    SelectItemType {
        item_type_id: Some(item_type_id.to_string()),
        note: note.map(str::to_string),
    }
}

async fn claim(
    pool: &SqlitePool,
    party_id: &str,
    guest_id: &str,
    item_type_id: &str,
    note: Option<&str>,
) -> Result<Selection, AppError> {
    db::selections::select_item_type(pool, party_id, guest_id, &pick(item_type_id, note)).await
}

/// Write straight through the upsert, leaving only the storage trigger to
/// enforce capacity.
async fn write_unchecked(
    pool: &SqlitePool,
    party_id: &str,
    guest_id: &str,
    item_type_id: &str,
    note: Option<&str>,
) -> Result<Selection, AppError> {
    db::selections::upsert_selection(pool, party_id, guest_id, item_type_id, note).await
}

async fn remaining(server: &TestServer, party_id: &str, item_type_id: &str) -> i64 {
    let snapshot = db::snapshot::get_snapshot(server.pool(), party_id).await.unwrap();
    snapshot
        .item_types
        .iter()
        .find(|t| t.item_type.id == item_type_id)
        .map(|t| t.remaining)
        .unwrap()
}

#[tokio::test]
async fn test_select_claims_a_slot() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Potluck").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 2).await;
    let guest = server.admit_guest(&party.id, "Ada").await;

    let (status, body) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &guest,
            &json!({ "item_type_id": drinks.id, "note": "  sparkling water " }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["item_type_id"], drinks.id.as_str());
    assert_eq!(body["data"]["guest_id"], guest.guest.id.as_str());
    assert_eq!(body["data"]["note"], "sparkling water");

    assert_eq!(remaining(&server, &party.id, &drinks.id).await, 1);

    let (_, me) = server
        .send(guest_request(
            Method::GET,
            &format!("/api/v1/parties/{}/me", party.id),
            &guest,
        ))
        .await;
    assert_eq!(me["data"]["selection"]["item_type_id"], drinks.id.as_str());
}

#[tokio::test]
async fn test_full_type_rejected_with_reason() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Potluck").await;
    let dessert = server.define_item_type(&party.id, "Dessert", 1).await;
    let first = server.admit_guest(&party.id, "Ada").await;
    let second = server.admit_guest(&party.id, "Grace").await;

    let (status, _) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &first,
            &json!({ "item_type_id": dessert.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &second,
            &json!({ "item_type_id": dessert.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "capacity_exceeded");
    assert_eq!(body["error"]["message"], ITEM_TYPE_FULL);
    assert_eq!(server.selection_count(&dessert.id).await, 1);
}

#[tokio::test]
async fn test_checked_and_trigger_rejections_look_the_same() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Same answer").await;
    let ice = server.define_item_type(&party.id, "Ice", 1).await;
    let holder = server.admit_guest(&party.id, "Ada").await;
    let late = server.admit_guest(&party.id, "Grace").await;
    claim(server.pool(), &party.id, &holder.guest.id, &ice.id, None)
        .await
        .unwrap();

    let checked = claim(server.pool(), &party.id, &late.guest.id, &ice.id, None)
        .await
        .unwrap_err();
    let raced = write_unchecked(server.pool(), &party.id, &late.guest.id, &ice.id, None)
        .await
        .unwrap_err();

    assert!(matches!(checked, AppError::CapacityExceeded(_)), "{checked}");
    assert!(matches!(raced, AppError::CapacityExceeded(_)), "{raced}");
    assert_eq!(checked.status(), raced.status());
    assert_eq!(checked.to_string(), raced.to_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_contention() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Contended").await;
    let chips = server.define_item_type(&party.id, "Chips", 2).await;

    let mut guests = Vec::new();
    for name in ["Ada", "Grace", "Linus"] {
        guests.push(server.admit_guest(&party.id, name).await);
    }

    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(guests.len()));
    let mut handles = Vec::new();
    for guest in &guests {
        let pool = server.pool().clone();
        let party_id = party.id.clone();
        let guest_id = guest.guest.id.clone();
        let input = pick(&chips.id, None);
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            db::selections::select_item_type(&pool, &party_id, &guest_id, &input).await
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::CapacityExceeded(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(rejected, 1);
    assert_eq!(server.selection_count(&chips.id).await, 2);
    assert_eq!(remaining(&server, &party.id, &chips.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_holds_under_heavy_contention() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Stampede").await;
    let salad = server.define_item_type(&party.id, "Salad", 3).await;
    let bread = server.define_item_type(&party.id, "Bread", 2).await;

    let mut guests = Vec::new();
    for i in 0..12 {
        guests.push(server.admit_guest(&party.id, &format!("Guest {i}")).await);
    }

    let mut handles = Vec::new();
    for (i, guest) in guests.iter().enumerate() {
        let pool = server.pool().clone();
        let party_id = party.id.clone();
        let guest_id = guest.guest.id.clone();
        let (first, second) = if i % 2 == 0 {
            (salad.id.clone(), bread.id.clone())
        } else {
            (bread.id.clone(), salad.id.clone())
        };
        handles.push(tokio::spawn(async move {
            let opening = claim(&pool, &party_id, &guest_id, &first, None).await;
            let switch = claim(&pool, &party_id, &guest_id, &second, None).await;
            [opening, switch]
        }));
    }

    let mut succeeded = 0;
    for result in futures_util::future::join_all(handles).await {
        for outcome in result.unwrap() {
            match outcome {
                Ok(_) => succeeded += 1,
                Err(AppError::CapacityExceeded(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }
    assert!(succeeded >= 5, "only {succeeded} claims landed");

    assert!(server.selection_count(&salad.id).await <= 3);
    assert!(server.selection_count(&bread.id).await <= 2);

    let per_guest_max: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(n), 0) FROM \
         (SELECT COUNT(*) AS n FROM selections GROUP BY party_id, guest_id)",
    )
    .fetch_one(server.pool())
    .await
    .unwrap();
    assert!(per_guest_max <= 1);
}

#[tokio::test]
async fn test_switch_moves_guest_atomically() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Switch").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 2).await;
    let dessert = server.define_item_type(&party.id, "Dessert", 2).await;
    let guest = server.admit_guest(&party.id, "Ada").await;

    let first = claim(server.pool(), &party.id, &guest.guest.id, &drinks.id, None)
        .await
        .unwrap();
    let switched = claim(server.pool(), &party.id, &guest.guest.id, &dessert.id, None)
        .await
        .unwrap();

    assert_eq!(switched.id, first.id);
    assert_eq!(switched.item_type_id, dessert.id);
    assert_eq!(server.selection_count(&drinks.id).await, 0);
    assert_eq!(server.selection_count(&dessert.id).await, 1);
}

#[tokio::test]
async fn test_failed_switch_keeps_current_selection() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Switch").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 2).await;
    let dessert = server.define_item_type(&party.id, "Dessert", 1).await;
    let holder = server.admit_guest(&party.id, "Grace").await;
    let mover = server.admit_guest(&party.id, "Ada").await;

    claim(server.pool(), &party.id, &holder.guest.id, &dessert.id, None)
        .await
        .unwrap();
    claim(server.pool(), &party.id, &mover.guest.id, &drinks.id, Some("lemonade"))
        .await
        .unwrap();

    let (status, _) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &mover,
            &json!({ "item_type_id": dessert.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let kept = db::selections::get_selection_for_guest(server.pool(), &party.id, &mover.guest.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.item_type_id, drinks.id);
    assert_eq!(kept.note.as_deref(), Some("lemonade"));
    assert_eq!(server.selection_count(&dessert.id).await, 1);
}

#[tokio::test]
async fn test_note_only_update_on_full_type() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Notes").await;
    let bread = server.define_item_type(&party.id, "Bread", 1).await;
    let guest = server.admit_guest(&party.id, "Ada").await;

    claim(server.pool(), &party.id, &guest.guest.id, &bread.id, None)
        .await
        .unwrap();
    assert_eq!(remaining(&server, &party.id, &bread.id).await, 0);

    let (status, body) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &guest,
            &json!({ "item_type_id": bread.id, "note": "bringing gluten-free" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["note"], "bringing gluten-free");
    assert_eq!(remaining(&server, &party.id, &bread.id).await, 0);
    assert_eq!(server.selection_count(&bread.id).await, 1);
}

#[tokio::test]
async fn test_release_frees_the_slot() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Release").await;
    let bread = server.define_item_type(&party.id, "Bread", 1).await;
    let guest = server.admit_guest(&party.id, "Ada").await;
    let next = server.admit_guest(&party.id, "Grace").await;

    claim(server.pool(), &party.id, &guest.guest.id, &bread.id, None)
        .await
        .unwrap();

    let (status, body) = server
        .send(guest_request(Method::DELETE, &selection_uri(&party.id), &guest))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["released"], true);

    let (status, body) = server
        .send(guest_request(Method::DELETE, &selection_uri(&party.id), &guest))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["released"], false);

    let (status, _) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &next,
            &json!({ "item_type_id": bread.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_select_validation() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Validation").await;
    let (other_party, _) = server.create_party(&admin, "Elsewhere").await;
    let foreign = server.define_item_type(&other_party.id, "Foreign", 5).await;
    let bread = server.define_item_type(&party.id, "Bread", 5).await;
    let guest = server.admit_guest(&party.id, "Ada").await;

    let (status, _) = server
        .send(guest_json_request(Method::PUT, &selection_uri(&party.id), &guest, &json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &guest,
            &json!({ "item_type_id": foreign.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "item type not found for this party");

    let (status, _) = server
        .send(guest_json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &guest,
            &json!({ "item_type_id": bread.id, "note": "n".repeat(201) }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .send(common::json_request(
            Method::PUT,
            &selection_uri(&party.id),
            &json!({ "item_type_id": bread.id }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trigger_rejects_writes_that_skip_the_check() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Bypass").await;
    let ice = server.define_item_type(&party.id, "Ice", 1).await;
    let cups = server.define_item_type(&party.id, "Cups", 3).await;
    let a = server.admit_guest(&party.id, "Ada").await;
    let b = server.admit_guest(&party.id, "Grace").await;

    write_unchecked(server.pool(), &party.id, &a.guest.id, &ice.id, None)
        .await
        .unwrap();

    // Insert path.
    let err = write_unchecked(server.pool(), &party.id, &b.guest.id, &ice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)), "{err}");

    // Update path: a guest on another type switching into the full one.
    write_unchecked(server.pool(), &party.id, &b.guest.id, &cups.id, None)
        .await
        .unwrap();
    let err = write_unchecked(server.pool(), &party.id, &b.guest.id, &ice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)), "{err}");

    // The holder can still rewrite their own row.
    write_unchecked(server.pool(), &party.id, &a.guest.id, &ice.id, Some("cubed"))
        .await
        .unwrap();

    assert_eq!(server.selection_count(&ice.id).await, 1);
    assert_eq!(server.selection_count(&cups.id).await, 1);
}

#[tokio::test]
async fn test_capacity_reduction_rejected() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Shrink").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 3).await;
    for name in ["Ada", "Grace"] {
        let guest = server.admit_guest(&party.id, name).await;
        claim(server.pool(), &party.id, &guest.guest.id, &drinks.id, None)
            .await
            .unwrap();
    }
    let uri = format!("/api/v1/admin/parties/{}/item-types/{}", party.id, drinks.id);

    let (status, body) = server
        .send(admin_json_request(
            Method::PATCH,
            &uri,
            &admin,
            &json!({ "capacity": 1, "name": "Beverages" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "cannot reduce capacity to 1: 2 guests have already selected this type"
    );

    // Rejected outright: the rename did not land either.
    let unchanged = db::item_types::get_item_type_in_party(server.pool(), &party.id, &drinks.id)
        .await
        .unwrap();
    assert_eq!(unchanged.capacity, 3);
    assert_eq!(unchanged.name, "Drinks");

    let (status, body) = server
        .send(admin_json_request(Method::PATCH, &uri, &admin, &json!({ "capacity": 2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["capacity"], 2);

    let (status, _) = server
        .send(admin_json_request(Method::PATCH, &uri, &admin, &json!({ "capacity": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_capacity_floor_trigger() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Floor").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 2).await;
    for name in ["Ada", "Grace"] {
        let guest = server.admit_guest(&party.id, name).await;
        write_unchecked(server.pool(), &party.id, &guest.guest.id, &drinks.id, None)
            .await
            .unwrap();
    }

    let result = sqlx::query("UPDATE item_types SET capacity = 1 WHERE id = ?")
        .bind(&drinks.id)
        .execute(server.pool())
        .await;
    let err = result.unwrap_err();
    assert!(is_trigger_rejection(&err, CAPACITY_CONFLICT_MARKER));
    let err: AppError = err.into();
    assert!(matches!(err, AppError::BadRequest(_)), "{err}");
}

#[tokio::test]
async fn test_delete_item_type_cascades_selections() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Cascade").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 2).await;
    let guest = server.admit_guest(&party.id, "Ada").await;
    claim(server.pool(), &party.id, &guest.guest.id, &drinks.id, None)
        .await
        .unwrap();

    let uri = format!("/api/v1/admin/parties/{}/item-types/{}", party.id, drinks.id);
    let (status, _) = server.send(admin_request(Method::DELETE, &uri, &admin)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(server.selection_count(&drinks.id).await, 0);
    let selection =
        db::selections::get_selection_for_guest(server.pool(), &party.id, &guest.guest.id)
            .await
            .unwrap();
    assert!(selection.is_none());

    let (status, _) = server.send(admin_request(Method::DELETE, &uri, &admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_item_type_admin_listing_and_sort_order() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Menu").await;
    let uri = format!("/api/v1/admin/parties/{}/item-types", party.id);

    for (name, capacity) in [("Drinks", 2), ("Dessert", 1)] {
        let (status, _) = server
            .send(admin_json_request(
                Method::POST,
                &uri,
                &admin,
                &json!({ "name": name, "capacity": capacity }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = server
        .send(admin_json_request(
            Method::POST,
            &uri,
            &admin,
            &json!({ "name": " ", "capacity": 1 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server
        .send(admin_json_request(
            Method::POST,
            &uri,
            &admin,
            &json!({ "name": "Ice", "capacity": 0 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.send(admin_request(Method::GET, &uri, &admin)).await;
    assert_eq!(status, StatusCode::OK);
    let types = body["data"].as_array().unwrap();
    assert_eq!(types.len(), 2);
    assert_eq!(types[0]["name"], "Drinks");
    assert_eq!(types[0]["sort_order"], 0);
    assert_eq!(types[1]["name"], "Dessert");
    assert_eq!(types[1]["sort_order"], 1);
    assert_eq!(types[1]["remaining"], 1);
    assert_eq!(types[1]["selections_count"], 0);
}

#[tokio::test]
async fn test_snapshot_lists_holders() {
    let server = TestServer::new().await;
    let admin = server.create_admin("host").await;
    let (party, _) = server.create_party(&admin, "Holders").await;
    let drinks = server.define_item_type(&party.id, "Drinks", 3).await;
    let guest = server.admit_guest(&party.id, "Ada").await;
    claim(server.pool(), &party.id, &guest.guest.id, &drinks.id, Some("cider"))
        .await
        .unwrap();

    let (status, body) = server
        .send(common::request(Method::GET, &format!("/api/v1/parties/{}", party.id)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["data"]["item_types"][0];
    assert_eq!(item["selections_count"], 1);
    assert_eq!(item["remaining"], 2);
    assert_eq!(item["selections"][0]["guest_display_name"], "Ada");
    assert_eq!(item["selections"][0]["note"], "cider");
}
