//! Common test utilities for teamsync-connector-graph integration tests.

#![cfg(feature = "integration")]
#![allow(dead_code)]

use serde_json::{json, Value};
use teamsync_connector_graph::{GraphConfig, GraphCredentials, GraphDirectory, RateLimitConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT_ID: &str = "test-tenant";
pub const GROUP_ID: &str = "group-1";

/// Wraps items in an `OData` collection response.
pub fn odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an `OData` error response.
pub fn odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

pub fn channel(id: &str, name: &str, membership_type: &str) -> Value {
    json!({
        "id": id,
        "displayName": name,
        "membershipType": membership_type
    })
}

pub fn conversation_member(id: &str, email: &str, roles: &[&str]) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.aadUserConversationMember",
        "id": id,
        "roles": roles,
        "displayName": email.split('@').next().unwrap_or_default(),
        "userId": format!("user-{id}"),
        "email": email
    })
}

/// Mock server wrapper with common setup helpers.
pub struct MockGraphServer {
    pub server: MockServer,
}

impl MockGraphServer {
    /// Starts a server with the token endpoint mounted.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let mock = Self { server };
        mock.mock_token_endpoint().await;
        mock
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Graph path under the mock server, e.g. `/v1.0/teams/group-1/members`.
    pub fn graph_path(suffix: &str) -> String {
        format!("/v1.0{suffix}")
    }

    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "mock-access-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&self.server)
            .await;
    }

    /// Serves `items` as a single page for GET `suffix`.
    pub async fn mock_collection(&self, suffix: &str, items: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(Self::graph_path(suffix)))
            .respond_with(ResponseTemplate::new(200).set_body_json(odata_response(items, None)))
            .mount(&self.server)
            .await;
    }

    pub fn config(&self) -> GraphConfig {
        GraphConfig::builder()
            .tenant_id(TENANT_ID)
            .graph_endpoint(self.url())
            .login_endpoint(self.url())
            .rate_limit(RateLimitConfig {
                circuit_failure_threshold: 100,
                ..RateLimitConfig::for_testing()
            })
            .build()
            .unwrap()
    }

    pub fn directory(&self) -> GraphDirectory {
        self.directory_with(self.config())
    }

    pub fn directory_with(&self, config: GraphConfig) -> GraphDirectory {
        GraphDirectory::new(config, GraphCredentials::new("client-id", "client-secret")).unwrap()
    }
}
