//! Wire shape of a session-end message on `chat_history_huasi` (§4.D step 1).
//!
//! `start`/`end` arrive as floating point on the wire even though they are
//! logically second-precision Unix timestamps; this coerces them to `i64`
//! at the deserialization boundary so the rest of the pipeline never sees
//! a float.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndEnvelope {
    pub session_id: String,
    #[serde(deserialize_with = "f64_as_i64")]
    pub start: i64,
    #[serde(deserialize_with = "f64_as_i64")]
    pub end: i64,
    pub unit_id: String,
    pub user_id: String,
    pub student_id: String,
}

fn f64_as_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floating_point_start_end_coerce_to_integers() {
        let json = r#"{
            "sessionId": "sid-1",
            "start": 1700000000.0,
            "end": 1700000123.0,
            "unitId": "U1",
            "userId": "stu-1",
            "studentId": "S-1"
        }"#;
        let envelope: SessionEndEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.start, 1_700_000_000);
        assert_eq!(envelope.end, 1_700_000_123);
    }
}
