// Unit tests for error module
// Startup errors are serialized for a supervising process

use crate::error::HostError;

use bridge_core::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Host errors serialize with their variant tag and message.
///
/// **BUG THIS CATCHES**: Would catch if `#[derive(Serialize)]` were removed or a
/// non-serializable field were added to a variant.
#[test]
fn given_host_error_when_serialized_then_contains_variant_and_message() {
    // GIVEN: A HostError
    let err = HostError::Server {
        message: String::from("port in use"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_string(&err).expect("Error should be serializable");

    // THEN: Tag and message are present
    assert!(json.contains("\"type\":\"Server\""));
    assert!(json.contains("port in use"));
}

#[test]
fn given_config_error_when_converted_then_becomes_config_variant() {
    let source = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: "dedup window".to_string(),
    };

    let err = HostError::from(source);

    match err {
        HostError::Config { message, .. } => assert!(message.contains("dedup window")),
        other => panic!("Expected Config variant, got {other:?}"),
    }
}
