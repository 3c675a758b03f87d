//! Publish a finalized estimate to the tracker
//!
//! Two actions per publish: a templated comment (fatal on failure) and the
//! numeric field update (degrades to a warning when the comment already
//! landed, since half the work is done and visible on the issue).

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::error::{BridgeError, Result};
use crate::protocol::{ApiRequest, ApiResponse, BridgeTransport, Method, PublishOutcome, PublishRequest};

/// Default comment posted on the issue; `{points}` is substituted.
pub const DEFAULT_COMMENT_TEMPLATE: &str =
    "Planning poker - the team voted *{points}* points for this story.";

/// Default per-round-trip timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Publishes estimates over a [`BridgeTransport`].
pub struct IssuePublisher<T: BridgeTransport> {
    transport: T,
    comment_template: String,
    timeout: Duration,
}

impl<T: BridgeTransport> IssuePublisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            comment_template: DEFAULT_COMMENT_TEMPLATE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_comment_template(mut self, template: impl Into<String>) -> Self {
        self.comment_template = template.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish one estimate: comment first, then the point fields.
    #[instrument(skip(self, request), fields(issue = %request.issue_key, points = request.points))]
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let base_url = request.base_url.trim_end_matches('/');
        let auth = basic_auth(&request.credentials.username, &request.credentials.token);
        let mut outcome = PublishOutcome::default();

        if request.add_comment {
            let comment = render_comment(&self.comment_template, request.points);
            let response = self.transport.round_trip(&ApiRequest {
                method: Method::Post,
                url: format!(
                    "{base_url}/rest/api/2/issue/{}/comment",
                    request.issue_key
                ),
                headers: default_headers(&auth),
                body: Some(json!({ "body": comment })),
                timeout: self.timeout,
            })?;
            if !response.is_success() {
                return Err(map_failure(&response, &request.issue_key));
            }
            outcome.comment_added = true;
            info!(issue = %request.issue_key, "Comment added");
        }

        if !request.point_fields.is_empty() {
            let fields: serde_json::Map<String, serde_json::Value> = request
                .point_fields
                .iter()
                .map(|field| (field.clone(), json!(request.points)))
                .collect();
            let update = self.transport.round_trip(&ApiRequest {
                method: Method::Put,
                url: format!("{base_url}/rest/api/2/issue/{}", request.issue_key),
                headers: default_headers(&auth),
                body: Some(json!({ "fields": fields })),
                timeout: self.timeout,
            });

            match update {
                Ok(response) if response.is_success() => {
                    outcome.fields_updated = true;
                    outcome.updated_fields = request.point_fields.clone();
                    info!(issue = %request.issue_key, fields = ?outcome.updated_fields, "Point fields updated");
                }
                Ok(response) => {
                    let failure = map_failure(&response, &request.issue_key);
                    if !outcome.comment_added {
                        return Err(failure);
                    }
                    warn!(issue = %request.issue_key, error = %failure, "Point field update failed");
                    outcome.warning = Some(format!(
                        "Comment added, but updating point fields failed: {failure}"
                    ));
                }
                Err(failure) => {
                    if !outcome.comment_added {
                        return Err(failure);
                    }
                    warn!(issue = %request.issue_key, error = %failure, "Point field update failed");
                    outcome.warning = Some(format!(
                        "Comment added, but updating point fields failed: {failure}"
                    ));
                }
            }
        }

        Ok(outcome)
    }
}

/// Substitute `{points}` into the comment template, trimming a trailing
/// `.0` from whole values so comments read "5", not "5.0".
fn render_comment(template: &str, points: f64) -> String {
    let formatted = if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        format!("{points}")
    };
    template.replace("{points}", &formatted)
}

fn basic_auth(username: &str, token: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{token}")))
}

fn default_headers(auth: &str) -> Vec<(String, String)> {
    vec![
        ("Authorization".to_string(), auth.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ]
}

/// Map a non-success response to the bridge error taxonomy.
fn map_failure(response: &ApiResponse, issue_key: &str) -> BridgeError {
    let message = upstream_message(response);
    match response.status {
        401 => BridgeError::Auth(
            "Check the username and personal access token".to_string(),
        ),
        403 => BridgeError::Permission(format!(
            "No access to {issue_key} or no permission for this action"
        )),
        404 => BridgeError::IssueNotFound(format!("{issue_key}: {message}")),
        status => BridgeError::Api { status, message },
    }
}

/// Pull the human-readable error out of a tracker response body.
///
/// The tracker reports either `errorMessages` (an array) or `errors`
/// (a field-name keyed object); fall back to the bare status.
fn upstream_message(response: &ApiResponse) -> String {
    if let Some(messages) = response.body.get("errorMessages").and_then(|v| v.as_array()) {
        let joined: Vec<&str> = messages.iter().filter_map(|m| m.as_str()).collect();
        if !joined.is_empty() {
            return joined.join(", ");
        }
    }
    if let Some(errors) = response.body.get("errors").and_then(|v| v.as_object()) {
        let joined: Vec<&str> = errors.values().filter_map(|m| m.as_str()).collect();
        if !joined.is_empty() {
            return joined.join(", ");
        }
    }
    format!("HTTP {}", response.status)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::Value;

    use super::*;
    use crate::protocol::Credentials;

    /// Mock transport replaying canned responses and recording requests.
    struct MockTransport {
        responses: RefCell<Vec<std::result::Result<ApiResponse, BridgeError>>>,
        requests: RefCell<Vec<ApiRequest>>,
    }

    impl MockTransport {
        fn new(responses: Vec<std::result::Result<ApiResponse, BridgeError>>) -> Self {
            Self {
                responses: RefCell::new(responses),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl BridgeTransport for MockTransport {
        fn round_trip(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, BridgeError> {
            self.requests.borrow_mut().push(request.clone());
            self.responses.borrow_mut().remove(0)
        }
    }

    fn ok(status: u16) -> std::result::Result<ApiResponse, BridgeError> {
        Ok(ApiResponse {
            status,
            body: Value::Null,
        })
    }

    fn failed(status: u16, body: Value) -> std::result::Result<ApiResponse, BridgeError> {
        Ok(ApiResponse { status, body })
    }

    fn request() -> PublishRequest {
        PublishRequest::new(
            "https://tracker.example/",
            "PROJ-7",
            Credentials::new("ana", "pat"),
            5.0,
        )
    }

    #[test]
    fn test_happy_path_comments_and_updates_fields() {
        let transport = MockTransport::new(vec![ok(201), ok(204)]);
        let publisher = IssuePublisher::new(transport);

        let outcome = publisher.publish(&request()).unwrap();
        assert!(outcome.comment_added);
        assert!(outcome.fields_updated);
        assert_eq!(outcome.updated_fields, ["customfield_10166"]);
        assert!(outcome.warning.is_none());

        let requests = publisher.transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        // Trailing slash on the base URL must not double up
        assert_eq!(
            requests[0].url,
            "https://tracker.example/rest/api/2/issue/PROJ-7/comment"
        );
        assert_eq!(requests[1].url, "https://tracker.example/rest/api/2/issue/PROJ-7");
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[1].method, Method::Put);
        // Whole points are written without a decimal part in the comment
        let comment = requests[0].body.as_ref().unwrap()["body"].as_str().unwrap();
        assert!(comment.contains("*5*"));
        // Basic auth assembled from username:token
        let auth = &requests[0].headers[0].1;
        assert_eq!(auth, &format!("Basic {}", BASE64.encode("ana:pat")));
    }

    #[test]
    fn test_auth_failure_maps_to_auth_error() {
        let transport = MockTransport::new(vec![failed(401, Value::Null)]);
        let publisher = IssuePublisher::new(transport);
        assert!(matches!(
            publisher.publish(&request()),
            Err(BridgeError::Auth(_))
        ));
    }

    #[test]
    fn test_missing_issue_maps_to_not_found() {
        let body = serde_json::json!({
            "errorMessages": ["Issue does not exist or you do not have permission to see it."]
        });
        let transport = MockTransport::new(vec![failed(404, body)]);
        let publisher = IssuePublisher::new(transport);
        let err = publisher.publish(&request()).unwrap_err();
        match err {
            BridgeError::IssueNotFound(message) => {
                assert!(message.contains("PROJ-7"));
                assert!(message.contains("does not exist"));
            }
            other => panic!("expected IssueNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_field_failure_after_comment_degrades_to_warning() {
        let body = serde_json::json!({
            "errors": { "customfield_10166": "Field cannot be set" }
        });
        let transport = MockTransport::new(vec![ok(201), failed(400, body)]);
        let publisher = IssuePublisher::new(transport);

        let outcome = publisher.publish(&request()).unwrap();
        assert!(outcome.comment_added);
        assert!(!outcome.fields_updated);
        let warning = outcome.warning.unwrap();
        assert!(warning.contains("Field cannot be set"));
    }

    #[test]
    fn test_field_failure_without_comment_is_fatal() {
        let mut req = request();
        req.add_comment = false;
        let transport = MockTransport::new(vec![failed(403, Value::Null)]);
        let publisher = IssuePublisher::new(transport);
        assert!(matches!(
            publisher.publish(&req),
            Err(BridgeError::Permission(_))
        ));
    }

    #[test]
    fn test_network_failure_on_comment_is_fatal() {
        let transport =
            MockTransport::new(vec![Err(BridgeError::Network("relay timed out".into()))]);
        let publisher = IssuePublisher::new(transport);
        assert!(matches!(
            publisher.publish(&request()),
            Err(BridgeError::Network(_))
        ));
    }

    #[test]
    fn test_comment_only_publish_skips_field_update() {
        let mut req = request();
        req.point_fields.clear();
        let transport = MockTransport::new(vec![ok(201)]);
        let publisher = IssuePublisher::new(transport);

        let outcome = publisher.publish(&req).unwrap();
        assert!(outcome.comment_added);
        assert!(!outcome.fields_updated);
        assert_eq!(publisher.transport.requests.borrow().len(), 1);
    }

    #[test]
    fn test_custom_template_and_fractional_points() {
        let mut req = request();
        req.points = 0.5;
        let transport = MockTransport::new(vec![ok(201), ok(204)]);
        let publisher =
            IssuePublisher::new(transport).with_comment_template("Estimated at {points} pts");

        publisher.publish(&req).unwrap();
        let requests = publisher.transport.requests.borrow();
        let comment = requests[0].body.as_ref().unwrap()["body"].as_str().unwrap();
        assert_eq!(comment, "Estimated at 0.5 pts");
    }
}
