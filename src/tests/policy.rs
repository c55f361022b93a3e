#![cfg(test)]

use crate::messages::snapshot::{ComponentSnapshot, FieldUpdate};
use crate::policy::directive::{FieldSpec, ReplicationDirective};
use crate::policy::error::PolicyError;
use crate::policy::rules::ReplicationRules;

use super::mock_world::{test_rules, value};

fn spec(directive: ReplicationDirective) -> FieldSpec {
    FieldSpec::new("field", directive)
}

#[test]
fn send_decision_table() {
    use ReplicationDirective::*;

    // (directive, is_owner, is_initial, expected)
    let cases = [
        (ServerToClient, false, false, true),
        (ServerToClient, true, true, true),
        (ServerToOwner, true, false, true),
        (ServerToOwner, false, false, false),
        (ServerToOwner, false, true, false),
        (OwnerToServer, true, true, true),
        (OwnerToServer, true, false, false),
        (OwnerToServer, false, true, false),
        (OwnerToServerToClient, true, true, true),
        (OwnerToServerToClient, true, false, false),
        (OwnerToServerToClient, false, false, true),
        (OwnerToServerToClient, false, true, true),
        (InitialOnly, false, true, true),
        (InitialOnly, true, false, false),
    ];
    for (directive, is_owner, is_initial, expected) in cases {
        assert_eq!(
            ReplicationRules::should_send(&spec(directive), is_owner, is_initial),
            expected,
            "{directive:?} owner={is_owner} initial={is_initial}"
        );
    }
}

#[test]
fn send_once_flag_overrides_any_directive() {
    let once = FieldSpec::send_once("field", ReplicationDirective::ServerToClient);
    assert!(ReplicationRules::should_send(&once, false, true));
    assert!(!ReplicationRules::should_send(&once, false, false));
    assert!(!ReplicationRules::should_send(&once, true, false));
}

#[test]
fn inbound_trust_requires_owner_and_owner_directive() {
    use ReplicationDirective::*;
    assert!(ReplicationRules::trusts_inbound(&spec(OwnerToServer), true));
    assert!(ReplicationRules::trusts_inbound(&spec(OwnerToServerToClient), true));
    assert!(!ReplicationRules::trusts_inbound(&spec(OwnerToServer), false));
    assert!(!ReplicationRules::trusts_inbound(&spec(OwnerToServerToClient), false));
    assert!(!ReplicationRules::trusts_inbound(&spec(ServerToClient), true));
    assert!(!ReplicationRules::trusts_inbound(&spec(ServerToOwner), true));
    assert!(!ReplicationRules::trusts_inbound(&spec(InitialOnly), true));
}

#[test]
fn filter_keeps_only_visible_fields() {
    let (rules, kinds) = test_rules();
    let raw = ComponentSnapshot::new(
        kinds.health,
        vec![
            FieldUpdate::new(0, value(50)),
            FieldUpdate::new(1, value(3)),
        ],
    );

    // Non-owner sees only `current`.
    let filtered = rules.filter_snapshot(&raw, false, true).unwrap();
    assert_eq!(filtered.fields.len(), 1);
    assert_eq!(filtered.fields[0].field, 0);

    // The owner sees both.
    let filtered = rules.filter_snapshot(&raw, true, true).unwrap();
    assert_eq!(filtered.fields.len(), 2);
}

#[test]
fn filter_omits_component_when_nothing_survives() {
    let (rules, kinds) = test_rules();
    let raw = ComponentSnapshot::new(kinds.inventory, vec![FieldUpdate::new(0, value(1))]);

    // OwnerToServer only: invisible to non-owners entirely.
    assert!(rules.filter_snapshot(&raw, false, true).is_none());
    assert!(rules.filter_snapshot(&raw, false, false).is_none());
    // And to the owner only at the initial seed.
    assert!(rules.filter_snapshot(&raw, true, true).is_some());
    assert!(rules.filter_snapshot(&raw, true, false).is_none());
}

#[test]
fn filter_drops_unknown_fields() {
    let (rules, kinds) = test_rules();
    let raw = ComponentSnapshot::new(
        kinds.inventory,
        vec![
            FieldUpdate::new(0, value(1)),
            // Out of schema range.
            FieldUpdate::new(9, value(2)),
        ],
    );
    let filtered = rules.filter_snapshot(&raw, true, true).unwrap();
    assert_eq!(filtered.fields.len(), 1);
}

#[test]
fn registration_assigns_dense_kinds() {
    let (rules, kinds) = test_rules();
    assert_eq!(kinds.transform.value(), 0);
    assert_eq!(kinds.profile.value(), 3);
    assert_eq!(rules.kind_from_name("health"), Some(kinds.health));
    assert_eq!(rules.kind_to_name(&kinds.inventory), "inventory");
    assert_eq!(rules.type_table().len(), 4);
}

#[test]
fn registration_rejects_duplicates_and_empty_schemas() {
    let mut rules = ReplicationRules::new();
    rules
        .register_component("transform", vec![spec(ReplicationDirective::ServerToClient)])
        .unwrap();
    assert!(matches!(
        rules.register_component("transform", vec![spec(ReplicationDirective::ServerToClient)]),
        Err(PolicyError::DuplicateComponent(_))
    ));
    assert!(matches!(
        rules.register_component("empty", Vec::new()),
        Err(PolicyError::EmptySchema(_))
    ));
}
