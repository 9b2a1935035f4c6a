#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use identity_sdk::{NewUser, UserUpdate};
use serde_json::json;

use crate::domain::credentials::{CredentialInput, CredentialRecordInput};
use crate::domain::error::DomainError;
use crate::domain::ports::ListScope;
use crate::domain::stores::{AttributeFilters, UserStore};
use crate::test_support::{
    CountingAuthorizer, DenyAllAuthorizer, FailingAuthorizer, ScopedAuthorizer, TestHarness,
    build_services, build_services_with_stores, ctx,
};

fn new_user(id: &str, username: &str, ou_id: &str) -> NewUser {
    NewUser {
        id: Some(id.to_owned()),
        user_type: "employee".to_owned(),
        ou_id: ou_id.to_owned(),
        attributes: json!({
            "username": username,
            "password": "initial-password",
            "pin": "0000"
        }),
    }
}

fn allow_all() -> TestHarness {
    build_services(Arc::new(CountingAuthorizer::new()))
}

#[tokio::test]
async fn create_extracts_credentials_out_of_attributes() {
    let harness = allow_all();
    let created = harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    // Credential attributes never reach the stored document.
    assert!(created.attributes.get("password").is_none());
    assert!(created.attributes.get("pin").is_none());
    assert_eq!(created.attributes["username"], "jdoe");

    let bundle = harness.user_store.stored_bundle("u1").unwrap();
    assert_eq!(
        bundle.records("password").unwrap()[0].value,
        "hashed:initial-password"
    );
    assert_eq!(bundle.records("pin").unwrap()[0].value, "hashed:0000");
}

#[tokio::test]
async fn create_rejects_unknown_user_type() {
    let harness = allow_all();
    let mut payload = new_user("u1", "jdoe", "engineering");
    payload.user_type = "contractor".to_owned();
    let err = harness
        .services
        .users
        .create_user(&ctx(), payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::SchemaNotFound { user_type } if user_type == "contractor"));
}

#[tokio::test]
async fn create_rejects_schema_violations() {
    let harness = allow_all();
    let mut payload = new_user("u1", "jdoe", "engineering");
    payload.attributes = json!({"email": "no-username@example.com"});
    let err = harness
        .services
        .users
        .create_user(&ctx(), payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::SchemaValidationFailed { .. }));
}

#[tokio::test]
async fn create_rejects_duplicate_username() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let err = harness
        .services
        .users
        .create_user(&ctx(), new_user("u2", "jdoe", "engineering"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AttributeConflict { path } if path == "username"));
}

#[tokio::test]
async fn update_with_own_username_is_not_a_conflict() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let updated = harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": "jdoe", "title": "engineer"}),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.attributes["title"], "engineer");
}

#[tokio::test]
async fn update_preserves_untouched_credential_types() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    let before = harness.user_store.stored_bundle("u1").unwrap();
    let pin_before = before.records("pin").unwrap()[0].clone();

    harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": "jdoe", "password": "rotated"}),
            },
        )
        .await
        .unwrap();

    let after = harness.user_store.stored_bundle("u1").unwrap();
    assert_eq!(after.records("password").unwrap()[0].value, "hashed:rotated");
    // The pin record survives byte-for-byte, salt included.
    assert_eq!(after.records("pin").unwrap()[0], pin_before);
}

#[tokio::test]
async fn update_without_credentials_leaves_bundle_alone() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    let before = harness.user_store.stored_bundle("u1").unwrap();

    harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": "jdoe", "title": "lead"}),
            },
        )
        .await
        .unwrap();

    assert_eq!(harness.user_store.stored_bundle("u1").unwrap(), before);
}

#[tokio::test]
async fn credential_cardinality_is_enforced_before_storage() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    let before = harness.user_store.stored_bundle("u1").unwrap();

    let record = |value: &str| CredentialRecordInput {
        storage_type: None,
        algorithm: None,
        iterations: None,
        key_length: None,
        salt: None,
        value: value.to_owned(),
    };
    let mut inputs = BTreeMap::new();
    inputs.insert(
        "password".to_owned(),
        CredentialInput::Records(vec![record("a"), record("b")]),
    );

    let err = harness
        .services
        .users
        .update_credentials(&ctx(), "u1", inputs)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidCredential { .. }));
    // Nothing was written.
    assert_eq!(harness.user_store.stored_bundle("u1").unwrap(), before);
}

#[tokio::test]
async fn update_credentials_overlays_supplied_types() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert(
        "password".to_owned(),
        CredentialInput::Plain("fresh".to_owned()),
    );
    harness
        .services
        .users
        .update_credentials(&ctx(), "u1", inputs)
        .await
        .unwrap();

    let bundle = harness.user_store.stored_bundle("u1").unwrap();
    assert_eq!(bundle.records("password").unwrap()[0].value, "hashed:fresh");
    assert_eq!(bundle.records("pin").unwrap()[0].value, "hashed:0000");
}

#[tokio::test]
async fn update_runs_one_check_without_a_move_and_two_with() {
    let authorizer = Arc::new(CountingAuthorizer::new());
    let harness = build_services(Arc::clone(&authorizer) as _);
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    let after_create = authorizer.check_count();

    harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": "jdoe"}),
            },
        )
        .await
        .unwrap();
    assert_eq!(authorizer.check_count() - after_create, 1);

    let before_move = authorizer.check_count();
    harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "sales".to_owned(),
                attributes: json!({"username": "jdoe"}),
            },
        )
        .await
        .unwrap();
    assert_eq!(authorizer.check_count() - before_move, 2);
}

#[tokio::test]
async fn denied_update_issues_no_write() {
    let seeded = allow_all();
    seeded
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    // Same store, deny-all policy.
    let denied = build_services_with_stores(
        Arc::clone(&seeded.user_store) as _,
        Arc::clone(&seeded.role_store) as _,
        Arc::new(DenyAllAuthorizer),
    );

    let err = denied
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": "renamed"}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unauthorized));

    let unchanged = seeded.services.users.get_user(&ctx(), "u1").await.unwrap();
    assert_eq!(unchanged.attributes["username"], "jdoe");
}

#[tokio::test]
async fn authorizer_failure_maps_to_internal() {
    let harness = build_services(Arc::new(FailingAuthorizer));
    let err = harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Internal));
}

#[tokio::test]
async fn unknown_org_unit_is_rejected() {
    let harness = allow_all();
    let err = harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "warehouse"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidOrgUnit { ou_id } if ou_id == "warehouse"));
}

#[tokio::test]
async fn empty_org_unit_is_rejected_after_the_second_check() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let err = harness
        .services
        .users
        .update_user(
            &ctx(),
            "u1",
            UserUpdate {
                user_type: "employee".to_owned(),
                ou_id: "   ".to_owned(),
                attributes: json!({"username": "jdoe"}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidOrgUnit { .. }));
}

#[tokio::test]
async fn negative_limit_is_invalid() {
    let harness = allow_all();
    let err = harness
        .services
        .users
        .list_users(&ctx(), &AttributeFilters::new(), Some(-1), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidLimit { limit: -1 }));
}

#[tokio::test]
async fn pagination_pages_concatenate_to_the_full_list() {
    let harness = allow_all();
    for i in 0..7 {
        harness
            .services
            .users
            .create_user(
                &ctx(),
                new_user(&format!("u{i}"), &format!("user{i}"), "engineering"),
            )
            .await
            .unwrap();
    }

    let filters = AttributeFilters::new();
    let mut collected = Vec::new();
    let mut offset = 0;
    loop {
        let page = harness
            .services
            .users
            .list_users(&ctx(), &filters, Some(3), offset)
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        if page.items.is_empty() {
            break;
        }
        collected.extend(page.items.into_iter().map(|u| u.id));
        offset += 3;
    }

    let full = harness
        .services
        .users
        .list_users(&ctx(), &filters, Some(7), 0)
        .await
        .unwrap();
    let full_ids: Vec<String> = full.items.into_iter().map(|u| u.id).collect();
    assert_eq!(collected, full_ids);

    // Offset past the total yields an empty page with the right total.
    let past = harness
        .services
        .users
        .list_users(&ctx(), &filters, Some(3), 100)
        .await
        .unwrap();
    assert!(past.items.is_empty());
    assert_eq!(past.total, 7);
}

#[tokio::test]
async fn list_scoping_restricts_and_short_circuits() {
    let seeded = allow_all();
    seeded
        .services
        .users
        .create_user(&ctx(), new_user("e1", "eng1", "engineering"))
        .await
        .unwrap();
    seeded
        .services
        .users
        .create_user(&ctx(), new_user("s1", "sales1", "sales"))
        .await
        .unwrap();

    // Reuse the seeded store through a scoped service instance.
    let scoped = build_services_with_stores(
        Arc::clone(&seeded.user_store) as _,
        Arc::clone(&seeded.role_store) as _,
        Arc::new(ScopedAuthorizer {
            scope: ListScope::Within(vec!["engineering".to_owned()]),
        }),
    );

    let page = scoped
        .users
        .list_users(&ctx(), &AttributeFilters::new(), Some(10), 0)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, "e1");

    let denied = build_services_with_stores(
        Arc::clone(&seeded.user_store) as _,
        Arc::clone(&seeded.role_store) as _,
        Arc::new(DenyAllAuthorizer),
    );
    let empty = denied
        .users
        .list_users(&ctx(), &AttributeFilters::new(), Some(10), 0)
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
    assert!(empty.items.is_empty());
}

#[tokio::test]
async fn authenticate_identifies_then_verifies() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let mut identifiers = AttributeFilters::new();
    identifiers.insert("username".to_owned(), json!("jdoe"));
    let mut supplied = BTreeMap::new();
    supplied.insert("password".to_owned(), "initial-password".to_owned());

    let user = harness
        .services
        .users
        .authenticate(&identifiers, &supplied)
        .await
        .unwrap();
    assert_eq!(user.id, "u1");

    supplied.insert("password".to_owned(), "wrong".to_owned());
    let err = harness
        .services
        .users
        .authenticate(&identifiers, &supplied)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AuthenticationFailed));

    identifiers.insert("username".to_owned(), json!("ghost"));
    let err = harness
        .services
        .users
        .authenticate(&identifiers, &supplied)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UserNotFound { .. }));
}

#[tokio::test]
async fn verify_fails_on_missing_credential_type() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();

    let mut supplied = BTreeMap::new();
    supplied.insert("passkey".to_owned(), "anything".to_owned());
    let err = harness
        .services
        .users
        .verify("u1", &supplied)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AuthenticationFailed));
}

#[tokio::test]
async fn user_groups_come_from_the_mutable_store() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    harness.user_store.add_group(
        "u1",
        identity_sdk::GroupSummary {
            id: "g1".to_owned(),
            name: "Platform".to_owned(),
        },
    );

    let page = harness
        .services
        .users
        .get_user_groups(&ctx(), "u1", Some(10), 0)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, "g1");
}

#[tokio::test]
async fn delete_removes_the_user() {
    let harness = allow_all();
    harness
        .services
        .users
        .create_user(&ctx(), new_user("u1", "jdoe", "engineering"))
        .await
        .unwrap();
    harness.services.users.delete_user(&ctx(), "u1").await.unwrap();

    assert!(!harness.user_store.exists("u1").await.unwrap());
    let err = harness
        .services
        .users
        .get_user(&ctx(), "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UserNotFound { .. }));
}
