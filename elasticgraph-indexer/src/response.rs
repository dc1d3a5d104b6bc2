//! Response categorization (§4.7 "State machine per operation").
//!
//! §9 open question: the source couples transport status and script-level signaling (a non-2xx
//! response matching the noop preamble still counts as a noop). Kept as specified rather than
//! redesigned into a dedicated return field, since nothing downstream of this crate currently
//! reads that field.

use serde_json::Value;

/// The Painless script's scripted-noop signal is a `ConflictException` (or similar) whose
/// message starts with this literal; the caller's bulk-response reason string is checked against
/// it verbatim.
pub const NOOP_MESSAGE_PREAMBLE: &str = "[noop] ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Noop,
    Failure { message: String },
}

/// Classify one bulk-response item for a single operation (§4.7):
/// - 2xx, non-noop `result` → success.
/// - 2xx with `result: noop`, or a 409 version conflict, or a 5xx whose error message begins
///   with the noop preamble → noop.
/// - anything else → failure.
pub fn categorize(status: u16, body: &Value) -> OperationOutcome {
    if status == 409 {
        return OperationOutcome::Noop;
    }

    if (200..300).contains(&status) {
        let result = body.get("result").and_then(Value::as_str).unwrap_or("");
        return if result == "noop" { OperationOutcome::Noop } else { OperationOutcome::Success };
    }

    let message = error_message(body);
    if (500..600).contains(&status) && message.starts_with(NOOP_MESSAGE_PREAMBLE) {
        return OperationOutcome::Noop;
    }

    OperationOutcome::Failure { message }
}

fn error_message(body: &Value) -> String {
    body.pointer("/error/reason")
        .or_else(|| body.pointer("/error/caused_by/reason"))
        .and_then(Value::as_str)
        .unwrap_or("the datastore did not provide a reason")
        .to_string()
}
