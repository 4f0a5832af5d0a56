//! Request body builders shared across API tests.

use serde_json::{json, Value};

pub fn connect_request(name: &str, grade: u8) -> Value {
    json!({ "name": name, "grade": grade })
}

pub fn solo_request(track: &str, boss_level: u8) -> Value {
    json!({ "track": track, "boss_level": boss_level })
}

pub fn room_request(track: &str, boss_level: u8) -> Value {
    json!({ "track": track, "boss_level": boss_level })
}

pub fn join_request(room_code: &str) -> Value {
    json!({ "room_code": room_code })
}

pub fn answer_request(problem_id: u64, value: i32, response_ms: i64) -> Value {
    json!({ "problem_id": problem_id, "value": value, "response_ms": response_ms })
}

pub fn firmup_answer_request(problem_id: u64, value: i32, response_ms: i64) -> Value {
    json!({
        "problem_id": problem_id,
        "value": value,
        "response_ms": response_ms,
        "firmup": true
    })
}
