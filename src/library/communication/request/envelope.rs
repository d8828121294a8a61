use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel on which requests for the given service and event are published
pub fn query_channel(service: &str, event: &str) -> String {
    format!("query:{}:{}", service, event)
}

/// Private reply channel of an individual request
///
/// Derived from the target service and the request identifier so that the responder
/// does not need any lookup to address its reply.
pub fn response_channel(service: &str, request_id: &str) -> String {
    format!("response:{}:{}", service, request_id)
}

/// Wire format of an outgoing request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryEnvelope<T = Value> {
    /// Request payload
    pub data: T,
    /// Unique identifier of this request
    pub request_id: String,
    /// Channel on which exactly one reply is expected
    pub response_channel: String,
    /// Time at which the request has been sent
    pub date: DateTime<Utc>,
    /// Process-local message counter, only used for diagnostics
    #[serde(rename = "id")]
    pub sequence: u64,
}

/// Wire format of a reply
///
/// Contains no request identifier, the channel it arrives on is the correlation key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T = Value> {
    /// Result produced by the handler
    pub data: T,
    /// Time at which the reply has been sent
    pub date: DateTime<Utc>,
    /// Process-local message counter of the responder
    #[serde(rename = "id")]
    pub sequence: u64,
}

#[cfg(test)]
mod does {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn name_channels() {
        assert_eq!(
            query_channel("auth", "check-file-access").as_str(),
            "query:auth:check-file-access"
        );
        assert_eq!(response_channel("auth", "1234").as_str(), "response:auth:1234");
    }

    #[test]
    fn serialize_query_with_wire_names() {
        let envelope = QueryEnvelope {
            data: json!({ "sessionId": "s1" }),
            request_id: "1234".into(),
            response_channel: "response:auth:1234".into(),
            date: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            sequence: 42,
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "data": { "sessionId": "s1" },
                "requestId": "1234",
                "responseChannel": "response:auth:1234",
                "date": "2021-03-04T05:06:07Z",
                "id": 42
            })
        );
    }

    #[test]
    fn parse_foreign_response() {
        let raw = r#"{"data":{"allowed":true},"date":"2021-03-04T05:06:07.123Z","id":7}"#;
        let envelope: ResponseEnvelope = serde_json::from_str(raw).unwrap();

        assert_eq!(envelope.data, json!({ "allowed": true }));
        assert_eq!(envelope.sequence, 7);
    }
}
