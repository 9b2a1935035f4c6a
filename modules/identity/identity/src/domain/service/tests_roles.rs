#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use identity_sdk::{Assignment, AssigneeType, NewRole, PermissionGrant, RoleUpdate};
use serde_json::json;

use crate::domain::error::DomainError;
use crate::domain::stores::RoleStore;
use crate::test_support::{CountingAuthorizer, TestHarness, build_services, ctx};

fn assignment(id: &str, assignee_type: AssigneeType) -> Assignment {
    Assignment {
        id: id.to_owned(),
        assignee_type,
    }
}

fn new_role(id: &str, name: &str, ou_id: &str) -> NewRole {
    NewRole {
        id: Some(id.to_owned()),
        name: name.to_owned(),
        description: None,
        ou_id: ou_id.to_owned(),
        permissions: vec![PermissionGrant {
            resource_server_id: "api".to_owned(),
            permissions: vec!["read".to_owned(), "write".to_owned()],
        }],
        assignments: Vec::new(),
    }
}

fn allow_all() -> TestHarness {
    build_services(Arc::new(CountingAuthorizer::new()))
}

async fn seed_user(harness: &TestHarness, id: &str, username: &str) {
    harness
        .services
        .users
        .create_user(
            &ctx(),
            identity_sdk::NewUser {
                id: Some(id.to_owned()),
                user_type: "employee".to_owned(),
                ou_id: "engineering".to_owned(),
                attributes: json!({"username": username}),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn create_role_dedupes_permissions_and_assignments() {
    let harness = allow_all();
    seed_user(&harness, "u1", "jdoe").await;

    let mut payload = new_role("r1", "Admins", "engineering");
    payload.permissions[0]
        .permissions
        .push("read".to_owned());
    payload.assignments = vec![
        assignment("u1", AssigneeType::User),
        assignment("u1", AssigneeType::User),
        assignment("u1", AssigneeType::Group),
    ];

    let created = harness
        .services
        .roles
        .create_role(&ctx(), payload)
        .await
        .unwrap();

    assert_eq!(created.permissions[0].permissions, vec!["read", "write"]);
    // The (type, id) pair is the dedup key; user and group assignees with
    // the same id are distinct.
    assert_eq!(created.assignments.len(), 2);
}

#[tokio::test]
async fn role_name_is_unique_within_an_org_unit() {
    let harness = allow_all();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();

    let err = harness
        .services
        .roles
        .create_role(&ctx(), new_role("r2", "Admins", "engineering"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RoleNameExists { .. }));

    // The same name is fine in a sibling unit.
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r3", "Admins", "sales"))
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_user_assignee_is_rejected() {
    let harness = allow_all();
    let mut payload = new_role("r1", "Admins", "engineering");
    payload.assignments = vec![assignment("ghost", AssigneeType::User)];

    let err = harness
        .services
        .roles
        .create_role(&ctx(), payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput { message } if message.contains("ghost")));
}

#[tokio::test]
async fn group_assignees_pass_through_unvalidated() {
    let harness = allow_all();
    let mut payload = new_role("r1", "Admins", "engineering");
    payload.assignments = vec![assignment("some-group", AssigneeType::Group)];

    let created = harness
        .services
        .roles
        .create_role(&ctx(), payload)
        .await
        .unwrap();
    assert_eq!(created.assignments.len(), 1);
}

#[tokio::test]
async fn empty_grant_resource_server_is_invalid() {
    let harness = allow_all();
    let mut payload = new_role("r1", "Admins", "engineering");
    payload.permissions[0].resource_server_id = String::new();

    let err = harness
        .services
        .roles
        .create_role(&ctx(), payload)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput { .. }));
}

#[tokio::test]
async fn update_keeps_unchanged_name_without_conflict() {
    let harness = allow_all();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();

    // Same name, same unit: matching itself is not a conflict.
    let updated = harness
        .services
        .roles
        .update_role(
            &ctx(),
            "r1",
            RoleUpdate {
                name: "Admins".to_owned(),
                description: Some("ops crew".to_owned()),
                ou_id: "engineering".to_owned(),
                permissions: Vec::new(),
                assignments: Vec::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("ops crew"));
}

#[tokio::test]
async fn rename_onto_taken_name_conflicts() {
    let harness = allow_all();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r2", "Auditors", "engineering"))
        .await
        .unwrap();

    let err = harness
        .services
        .roles
        .update_role(
            &ctx(),
            "r2",
            RoleUpdate {
                name: "Admins".to_owned(),
                description: None,
                ou_id: "engineering".to_owned(),
                permissions: Vec::new(),
                assignments: Vec::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RoleNameExists { .. }));
}

#[tokio::test]
async fn move_between_org_units_triggers_a_second_check() {
    let authorizer = Arc::new(CountingAuthorizer::new());
    let harness = build_services(Arc::clone(&authorizer) as _);
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();

    let before = authorizer.check_count();
    harness
        .services
        .roles
        .update_role(
            &ctx(),
            "r1",
            RoleUpdate {
                name: "Admins".to_owned(),
                description: None,
                ou_id: "sales".to_owned(),
                permissions: Vec::new(),
                assignments: Vec::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(authorizer.check_count() - before, 2);
}

#[tokio::test]
async fn add_and_remove_assignments_round_trip() {
    let harness = allow_all();
    seed_user(&harness, "u1", "jdoe").await;
    seed_user(&harness, "u2", "asmith").await;
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();

    let role = harness
        .services
        .roles
        .add_assignments(
            &ctx(),
            "r1",
            vec![
                assignment("u1", AssigneeType::User),
                assignment("u2", AssigneeType::User),
            ],
        )
        .await
        .unwrap();
    assert_eq!(role.assignments.len(), 2);

    // Re-adding an existing pair is a no-op.
    let role = harness
        .services
        .roles
        .add_assignments(&ctx(), "r1", vec![assignment("u1", AssigneeType::User)])
        .await
        .unwrap();
    assert_eq!(role.assignments.len(), 2);

    let role = harness
        .services
        .roles
        .remove_assignments(&ctx(), "r1", vec![assignment("u1", AssigneeType::User)])
        .await
        .unwrap();
    assert_eq!(role.assignments.len(), 1);
    assert_eq!(role.assignments[0].id, "u2");
}

#[tokio::test]
async fn delete_removes_the_role() {
    let harness = allow_all();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();
    harness.services.roles.delete_role(&ctx(), "r1").await.unwrap();

    assert!(!harness.role_store.exists("r1").await.unwrap());
    let err = harness
        .services
        .roles
        .get_role(&ctx(), "r1")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RoleNotFound { .. }));
}

#[tokio::test]
async fn duplicate_role_id_conflicts() {
    let harness = allow_all();
    harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Admins", "engineering"))
        .await
        .unwrap();
    let err = harness
        .services
        .roles
        .create_role(&ctx(), new_role("r1", "Others", "sales"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DuplicateResource { id } if id == "r1"));
}
