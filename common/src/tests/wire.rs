use crate::wire::{
    AckFrame, CommandAck, EntityDelta, PushEnvelope, PushLevel, PushOp, RpcId, RpcResponse,
    StoreKey, error_codes,
};

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::value::RawValue;
use serde_json::{Value, json};

const DOCUMENTS: StoreKey = StoreKey::new("documents");

#[test]
fn given_push_levels_then_debounce_durations_are_fixed() {
    assert_eq!(PushLevel::Hot.debounce(), Duration::ZERO);
    assert_eq!(PushLevel::Warm.debounce(), Duration::from_millis(12));
    assert_eq!(PushLevel::Cold.debounce(), Duration::from_millis(32));
}

/// **VALUE**: The push envelope uses the exact keys the surface reads.
#[test]
fn given_push_envelope_when_encoded_then_uses_wire_keys() {
    // GIVEN: A pre-serialized payload
    let payload = RawValue::from_string(r#"{"title":"draft"}"#.to_string()).unwrap();
    let envelope = PushEnvelope {
        version: 1,
        revision: 7,
        epoch: 2,
        push_id: "push-1",
        store: DOCUMENTS,
        op: PushOp::Replace,
        level: PushLevel::Warm,
        payload: &payload,
    };

    // WHEN: Encoding
    let value: Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

    // THEN: Every field is present under its wire name
    assert_eq!(
        value,
        json!({
            "__v": 1,
            "__revision": 7,
            "__epoch": 2,
            "__pushId": "push-1",
            "store": "documents",
            "op": "replace",
            "level": "warm",
            "payload": {"title": "draft"}
        })
    );
}

/// **VALUE**: Absent delta fields are omitted rather than encoded as `null`.
#[test]
fn given_delta_with_only_changes_when_encoded_then_removed_is_omitted() {
    let mut changed = BTreeMap::new();
    changed.insert("a".to_string(), 1);

    let delta = EntityDelta::new(changed, Vec::new());
    let encoded = serde_json::to_string(&delta).unwrap();

    assert_eq!(encoded, r#"{"changed":{"a":1}}"#);
    assert!(!delta.is_empty());
}

#[test]
fn given_empty_collections_when_delta_built_then_delta_is_empty() {
    let delta: EntityDelta<u32> = EntityDelta::new(BTreeMap::new(), Vec::new());

    assert!(delta.is_empty());
    assert_eq!(serde_json::to_string(&delta).unwrap(), "{}");

    let explicit = EntityDelta::<u32> {
        changed: Some(BTreeMap::new()),
        removed: Some(Vec::new()),
    };
    assert!(explicit.is_empty());
}

#[test]
fn given_id_values_when_classified_then_only_scalars_are_ids() {
    assert_eq!(
        RpcId::from_value(&json!("abc")),
        Some(RpcId::String("abc".into()))
    );
    assert!(matches!(RpcId::from_value(&json!(4.5)), Some(RpcId::Number(_))));
    assert_eq!(RpcId::from_value(&Value::Null), Some(RpcId::Null));
    assert_eq!(RpcId::from_value(&json!({"a": 1})), None);
    assert_eq!(RpcId::from_value(&json!([1])), None);
    assert_eq!(RpcId::from_value(&json!(true)), None);
}

#[test]
fn given_responses_when_encoded_then_follow_jsonrpc_shape() {
    let ok = RpcResponse::success(RpcId::Number(3.into()), Value::Null);
    assert_eq!(
        serde_json::to_value(&ok).unwrap(),
        json!({"jsonrpc": "2.0", "id": 3, "result": null})
    );

    let err = RpcResponse::failure(
        RpcId::String("x".into()),
        error_codes::METHOD_NOT_FOUND,
        "Method not found",
    );
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({"jsonrpc": "2.0", "id": "x", "error": {"code": -32601, "message": "Method not found"}})
    );
    assert_eq!(err.error_code(), Some(-32601));
}

#[test]
fn given_ack_when_framed_then_uses_camel_case_and_omits_absent_fields() {
    let frame = AckFrame {
        ack: CommandAck::ok("cmd-1".into(), "documents.upsert".into(), None),
    };

    assert_eq!(
        serde_json::to_value(&frame).unwrap(),
        json!({"__ack": {"commandId": "cmd-1", "method": "documents.upsert", "status": "ok"}})
    );
}
