use ferroform_provider::lifecycle::{InstanceStatus, Operation};
use ferroform_provider::{InstanceState, ProviderError};

#[test]
fn operations_enter_their_in_flight_status() {
    let cases = [
        (InstanceStatus::Absent, Operation::Create, InstanceStatus::Creating),
        (InstanceStatus::Present, Operation::Read, InstanceStatus::Present),
        (InstanceStatus::Present, Operation::Update, InstanceStatus::Updating),
        (InstanceStatus::Present, Operation::Delete, InstanceStatus::Deleting),
    ];
    for (from, op, to) in cases {
        assert_eq!(from.begin(op).unwrap(), to, "{from} + {op}");
    }
}

#[test]
fn delete_is_allowed_on_absent_instances() {
    let deleting = InstanceStatus::Absent.begin(Operation::Delete).unwrap();
    assert_eq!(deleting, InstanceStatus::Deleting);
}

#[test]
fn illegal_transitions_are_rejected() {
    let cases = [
        (InstanceStatus::Present, Operation::Create),
        (InstanceStatus::Absent, Operation::Update),
        (InstanceStatus::Absent, Operation::Read),
        (InstanceStatus::Creating, Operation::Update),
        (InstanceStatus::Deleting, Operation::Create),
    ];
    for (from, op) in cases {
        match from.begin(op) {
            Err(ProviderError::Lifecycle(msg)) => {
                assert!(msg.contains(&from.to_string()), "{msg}");
            }
            other => panic!("{from} + {op} should be rejected, got {other:?}"),
        }
    }
}

#[test]
fn new_state_is_present_and_untainted() {
    let state = InstanceState::new("aws_prometheus_workspace", "ws-1", serde_json::Map::new());
    assert_eq!(state.status, InstanceStatus::Present);
    assert!(!state.tainted);
    assert_eq!(state.get_str("id"), Some("ws-1"));
}

#[test]
fn state_without_taint_flag_deserializes_untainted() {
    let state: InstanceState = serde_json::from_value(serde_json::json!({
        "resource_type": "aws_prometheus_workspace",
        "id": "ws-1",
        "status": "present",
        "attributes": { "id": "ws-1" },
    }))
    .unwrap();
    assert!(!state.tainted);
}
