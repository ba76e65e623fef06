use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use uuid::Uuid;

/// Signature accepted by test deployments of the webhook endpoint.
pub const TEST_SIGNATURE: &str = "v1,test_signature_here";

/// Builds a Clerk-style webhook event envelope.
pub fn webhook_payload(event_type: &str, data: Value) -> Value {
    json!({
        "type": event_type,
        "data": data,
        "object": "event",
        "event_attributes": {
            "http_request": {
                "client_ip": "127.0.0.1"
            }
        }
    })
}

/// Svix signature headers for a webhook delivery sent now.
pub fn webhook_headers() -> Vec<(String, String)> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string();

    vec![
        ("svix-id".to_string(), format!("msg_test_{}", timestamp)),
        ("svix-timestamp".to_string(), timestamp),
        ("svix-signature".to_string(), TEST_SIGNATURE.to_string()),
        ("content-type".to_string(), "application/json".to_string()),
    ]
}

fn short_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

/// Generates user data as Clerk sends it in `user.*` events.
///
/// Missing ids and emails get unique random values.
pub fn generate_user_data(user_id: Option<&str>, email: Option<&str>) -> Value {
    let id = user_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("user_test_{}", short_hex(8)));
    let email = email
        .map(str::to_string)
        .unwrap_or_else(|| format!("test-{}@cfipros-testing.com", short_hex(8)));

    json!({
        "id": id,
        "email_addresses": [{"email_address": email}],
        "first_name": "Test",
        "last_name": "User",
        "username": format!("testuser_{}", short_hex(6)),
        "created_at": 1_609_459_200_000u64,
        "updated_at": 1_609_459_200_000u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_envelope() {
        let payload = webhook_payload("user.created", json!({"id": "user_1"}));
        assert_eq!(payload["type"], "user.created");
        assert_eq!(payload["object"], "event");
        assert_eq!(payload["data"]["id"], "user_1");
        assert_eq!(
            payload["event_attributes"]["http_request"]["client_ip"],
            "127.0.0.1"
        );
    }

    #[test]
    fn test_headers() {
        let headers = webhook_headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        let timestamp = get("svix-timestamp");
        assert_eq!(get("svix-id"), format!("msg_test_{}", timestamp));
        assert_eq!(get("svix-signature"), TEST_SIGNATURE);
        assert_eq!(get("content-type"), "application/json");
        assert!(timestamp.parse::<u64>().unwrap() > 1_600_000_000);
    }

    #[test]
    fn test_generated_user_is_unique() {
        let a = generate_user_data(None, None);
        let b = generate_user_data(None, None);
        assert_ne!(a["id"], b["id"]);
        assert!(a["id"].as_str().unwrap().starts_with("user_test_"));
        assert!(a["email_addresses"][0]["email_address"]
            .as_str()
            .unwrap()
            .ends_with("@cfipros-testing.com"));
        assert_eq!(a["created_at"], 1_609_459_200_000u64);
    }

    #[test]
    fn test_generated_user_explicit_values() {
        let user = generate_user_data(Some("user_1"), Some("a@b.test"));
        assert_eq!(user["id"], "user_1");
        assert_eq!(user["email_addresses"][0]["email_address"], "a@b.test");
        assert_eq!(user["first_name"], "Test");
    }
}
