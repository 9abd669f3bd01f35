use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn capture_location() -> ErrorLocation {
    ErrorLocation::caller()
}

/// **VALUE**: `ErrorLocation::caller()` reports the call site, not the constructor.
#[test]
fn given_track_caller_helper_when_called_then_reports_call_site() {
    // GIVEN/WHEN: Capturing from two consecutive lines
    let first = capture_location();
    let second = capture_location();

    // THEN: Both point into this file on sequential lines
    assert!(first.file.contains("error_location.rs"));
    assert_eq!(first.line + 1, second.line);
    assert!(first.column > 0);
}

/// **VALUE**: Error messages render locations as `[file:line:column]`.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    let location = ErrorLocation::from(Location::caller());

    let formatted = location.to_string();

    assert!(formatted.starts_with('['));
    assert!(formatted.ends_with(']'));
    assert!(formatted.contains(&location.line.to_string()));
    assert_eq!(formatted.matches(':').count(), 2);
}
