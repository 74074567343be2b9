//! Cache wire format for access tokens
//!
//! Records are cached as a flat JSON object:
//!
//! ```json
//! {"ProjectId":"p","UserName":"alice","LoginTime":1700000000123456789,
//!  "LoginId":"tok-1","DeviceID":"","IP":"","Type":"","UserAgent":"","Info":""}
//! ```
//!
//! `LoginTime` is an integer count of nanoseconds since the Unix epoch. These
//! key names are shared with entries already written by deployed services and
//! must not change. Decoding is strict: every key must be present with the
//! right JSON type, otherwise [`SessionError::Extract`] is returned. Unknown
//! keys are ignored.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::models::AccessToken;

#[derive(Debug, Serialize, Deserialize)]
struct WireAccessToken {
    #[serde(rename = "ProjectId")]
    project_id: String,
    #[serde(rename = "UserName")]
    user_name: String,
    #[serde(rename = "LoginTime")]
    login_time: i64,
    #[serde(rename = "LoginId")]
    login_id: String,
    #[serde(rename = "DeviceID")]
    device_id: String,
    #[serde(rename = "IP")]
    ip: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "UserAgent")]
    user_agent: String,
    #[serde(rename = "Info")]
    info: String,
}

/// Encode a record for the cache.
///
/// Fails with [`SessionError::Invalid`] when the login time cannot be
/// expressed in i64 nanoseconds.
pub fn encode(token: &AccessToken) -> SessionResult<String> {
    let wire = WireAccessToken {
        project_id: token.project_id.clone(),
        user_name: token.user_name.clone(),
        login_time: token.login_time_nanos()?,
        login_id: token.login_id.clone(),
        device_id: token.device_id.clone(),
        ip: token.ip.clone(),
        kind: token.kind.clone(),
        user_agent: token.user_agent.clone(),
        info: token.info.clone(),
    };
    serde_json::to_string(&wire).map_err(|e| SessionError::Invalid(e.to_string()))
}

/// Decode a cached record.
pub fn decode(source: &str) -> SessionResult<AccessToken> {
    let wire: WireAccessToken = serde_json::from_str(source)?;
    Ok(AccessToken {
        project_id: wire.project_id,
        user_name: wire.user_name,
        login_time: DateTime::from_timestamp_nanos(wire.login_time),
        login_id: wire.login_id,
        device_id: wire.device_id,
        ip: wire.ip,
        kind: wire.kind,
        user_agent: wire.user_agent,
        info: wire.info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginMetadata;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn sample() -> AccessToken {
        AccessToken::new(
            "proj",
            "alice",
            "tok-1",
            Utc.timestamp_nanos(1_700_000_000_123_456_789),
            LoginMetadata {
                device_id: "phone".to_string(),
                ip: "10.0.0.1".to_string(),
                user_agent: "curl/8".to_string(),
                kind: "mobile".to_string(),
                info: "{}".to_string(),
            },
        )
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let encoded: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "ProjectId": "proj",
                "UserName": "alice",
                "LoginTime": 1_700_000_000_123_456_789_i64,
                "LoginId": "tok-1",
                "DeviceID": "phone",
                "IP": "10.0.0.1",
                "Type": "mobile",
                "UserAgent": "curl/8",
                "Info": "{}",
            })
        );
    }

    #[test]
    fn test_type_is_read_from_type_not_ip() {
        let decoded = decode(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(decoded.kind, "mobile");
        assert_eq!(decoded.ip, "10.0.0.1");
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let mut encoded: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        encoded.as_object_mut().unwrap().remove("LoginId");
        assert!(matches!(
            decode(&encoded.to_string()),
            Err(SessionError::Extract(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let mut encoded: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        encoded["LoginTime"] = json!(1.5e18);
        assert!(matches!(
            decode(&encoded.to_string()),
            Err(SessionError::Extract(_))
        ));

        let mut encoded: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        encoded["UserName"] = json!(null);
        assert!(matches!(
            decode(&encoded.to_string()),
            Err(SessionError::Extract(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not json"), Err(SessionError::Extract(_))));
        assert!(matches!(decode("[]"), Err(SessionError::Extract(_))));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let mut encoded: Value = serde_json::from_str(&encode(&sample()).unwrap()).unwrap();
        encoded["Email"] = json!("alice@example.com");
        assert_eq!(decode(&encoded.to_string()).unwrap(), sample());
    }

    #[test]
    fn test_encode_rejects_out_of_range_login_time() {
        let mut token = sample();
        token.login_time = Utc.with_ymd_and_hms(1500, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(encode(&token), Err(SessionError::Invalid(_))));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            project_id in ".*",
            user_name in ".*",
            login_id in ".*",
            nanos in -9_000_000_000_000_000_000i64..9_000_000_000_000_000_000i64,
            device_id in ".*",
            ip in ".*",
            kind in ".*",
            user_agent in ".*",
            info in ".*",
        ) {
            let token = AccessToken {
                project_id,
                user_name,
                login_time: DateTime::from_timestamp_nanos(nanos),
                login_id,
                device_id,
                ip,
                kind,
                user_agent,
                info,
            };
            let decoded = decode(&encode(&token).unwrap()).unwrap();
            prop_assert_eq!(decoded.login_time_nanos().unwrap(), nanos);
            prop_assert_eq!(decoded, token);
        }
    }
}
