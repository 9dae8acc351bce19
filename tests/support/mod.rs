#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use portal_client::auth::{KeyValueStore, MemoryKeyValueStore, SessionSignal, TeardownReason};
use portal_client::client::ApiClient;
use portal_client::config::ClientConfig;
use serde_json::{json, Value};
use wiremock::MockServer;

/// Records every `session_ended` call.
#[derive(Default)]
pub struct RecordingSignal {
    reasons: Mutex<Vec<TeardownReason>>,
}

impl RecordingSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reasons(&self) -> Vec<TeardownReason> {
        self.reasons.lock().expect("signal lock poisoned").clone()
    }
}

impl SessionSignal for RecordingSignal {
    fn session_ended(&self, reason: TeardownReason) {
        self.reasons
            .lock()
            .expect("signal lock poisoned")
            .push(reason);
    }
}

pub fn user_json(roles: &[&str]) -> Value {
    let user_roles: Vec<Value> = roles
        .iter()
        .map(|name| json!({ "role": { "name": name }, "entity_type": "department", "entity_id": 3 }))
        .collect();
    json!({
        "id": 42,
        "faculty_id": "2020-0042",
        "username": "mreyes",
        "first_name": "Maria",
        "last_name": "Reyes",
        "email": "mreyes@example.edu",
        "user_roles": user_roles,
    })
}

/// Store holding a signed-in chairperson session.
pub fn seeded_store(access: &str, refresh: &str) -> Arc<MemoryKeyValueStore> {
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.set("access", access).expect("seed access");
    kv.set("refresh", refresh).expect("seed refresh");
    kv.set("user", &user_json(&["Chairperson"]).to_string())
        .expect("seed user");
    kv.set("activeRole", "chairperson").expect("seed role");
    kv
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(format!("{}/api", server.uri()))
}

pub fn client_for(
    server: &MockServer,
    kv: Arc<dyn KeyValueStore>,
    signal: Arc<RecordingSignal>,
) -> ApiClient {
    ApiClient::builder()
        .config(config_for(server))
        .kv(kv)
        .signal(signal)
        .build()
        .expect("build client")
}

pub fn session_keys_absent(kv: &dyn KeyValueStore) -> bool {
    ["access", "refresh", "user", "activeRole"]
        .iter()
        .all(|key| kv.get(key).expect("read key").is_none())
}
