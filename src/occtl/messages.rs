//! Decoding of `occtl --json` output.
//!
//! occtl prints far more than the exporter consumes, and the shape of some
//! values drifts between ocserv releases (counters printed as quoted strings,
//! MTU printed as a number or a string). The structures here only name the
//! fields that are published and ignore everything else.

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::OcctlError;

/// Server-wide status as printed by `occtl --json -n show status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMessage {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Server PID")]
    pub server_pid: i64,
    #[serde(rename = "Sec-mod PID")]
    pub secmod_pid: i64,
    /// Server start time, seconds since the unix epoch.
    #[serde(rename = "raw_up_since")]
    pub raw_up_since: i64,
    #[serde(rename = "uptime")]
    pub uptime: i64,
    #[serde(rename = "Active sessions")]
    pub active_sessions: i64,
    /// Sessions handled since the server started.
    #[serde(rename = "Total sessions")]
    pub handled_sessions: i64,
    #[serde(rename = "Total authentication failures")]
    pub total_authentication_failures: i64,
    #[serde(rename = "IPs in ban list")]
    pub ips_banned: i64,
    #[serde(rename = "raw_last_stats_reset")]
    pub raw_last_stats_reset: i64,

    // Counters below are relative to the last stats reset.
    #[serde(rename = "Sessions handled")]
    pub sessions_handled: i64,
    #[serde(rename = "Timed out sessions")]
    pub timed_out_sessions: i64,
    #[serde(rename = "Timed out (idle) sessions")]
    pub timed_out_idle_sessions: i64,
    #[serde(rename = "Closed due to error sessions")]
    pub closed_due_to_error_sessions: i64,
    #[serde(rename = "Authentication failures")]
    pub authentication_failures: i64,
    #[serde(rename = "raw_avg_auth_time")]
    pub raw_avg_auth_time: i64,
    #[serde(rename = "raw_max_auth_time")]
    pub raw_max_auth_time: i64,
    #[serde(rename = "raw_avg_session_time")]
    pub raw_avg_session_time: i64,
    #[serde(rename = "raw_max_session_time")]
    pub raw_max_session_time: i64,
    #[serde(rename = "raw_rx")]
    pub raw_rx: i64,
    #[serde(rename = "raw_tx")]
    pub raw_tx: i64,

    #[serde(rename = "Min MTU")]
    pub min_mtu: i16,
    #[serde(rename = "Max MTU")]
    pub max_mtu: i16,
}

/// One connected session as printed by `occtl --json -n show users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersMessage {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "vhost")]
    pub vhost: String,
    #[serde(rename = "Device")]
    pub device: String,
    #[serde(rename = "MTU", deserialize_with = "string_or_number")]
    pub mtu: String,
    #[serde(rename = "Remote IP")]
    pub remote_ip: String,
    #[serde(rename = "IPv4")]
    pub vpn_ipv4: String,
    #[serde(rename = "IPv6")]
    pub vpn_ipv6: String,
    #[serde(rename = "RX", deserialize_with = "integer_or_quoted")]
    pub raw_rx: i64,
    #[serde(rename = "TX", deserialize_with = "integer_or_quoted")]
    pub raw_tx: i64,
    #[serde(rename = "Average RX")]
    pub average_rx: String,
    #[serde(rename = "Average TX")]
    pub average_tx: String,
    /// Session start, seconds since the unix epoch. Zero when occtl omits it.
    #[serde(rename = "raw_connected_at", deserialize_with = "integer_or_quoted")]
    pub raw_connected_at: i64,
}

impl UsersMessage {
    /// Label values in the order of [`crate::metrics::USER_LABELS`].
    pub fn label_values(&self) -> [&str; 6] {
        [
            &self.username,
            &self.remote_ip,
            &self.mtu,
            &self.vpn_ipv4,
            &self.vpn_ipv6,
            &self.device,
        ]
    }
}

/// Decodes the output of `occtl --json -n show status`. Anything but a JSON
/// object is rejected.
pub fn decode_status(bytes: &[u8]) -> Result<StatusMessage, OcctlError> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(StatusMessage::deserialize(require_object(value, "status")?)?)
}

/// Decodes the output of `occtl --json -n show users`.
///
/// occtl prints `[]` when nobody is connected; a bare `null` is treated the
/// same way. Every session must be a JSON object.
pub fn decode_users(bytes: &[u8]) -> Result<Vec<UsersMessage>, OcctlError> {
    let sessions = match serde_json::from_slice::<Value>(bytes)? {
        Value::Null => return Ok(Vec::new()),
        Value::Array(sessions) => sessions,
        other => {
            return Err(OcctlError::Decode(de::Error::custom(format!(
                "expected users to be a JSON array, found {}",
                json_kind(&other)
            ))))
        }
    };

    sessions
        .into_iter()
        .map(|session| -> Result<UsersMessage, OcctlError> {
            Ok(UsersMessage::deserialize(require_object(session, "session")?)?)
        })
        .collect()
}

// Derived structs also deserialize from arrays (fields by position).
fn require_object(value: Value, what: &str) -> Result<Value, serde_json::Error> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(de::Error::custom(format!(
            "expected {} to be a JSON object, found {}",
            what,
            json_kind(&value)
        )))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accepts `123` as well as `"123"`.
fn integer_or_quoted<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntegerOrQuoted;

    impl<'de> Visitor<'de> for IntegerOrQuoted {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a quoted integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(IntegerOrQuoted)
}

/// Accepts `"1434"` as well as `1434`, keeping the textual form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}
