// crates.io
use httpmock::prelude::*;
// self
use reglookup::{
	_preludet::*,
	broker::TokenBroker,
	error::AuthError,
};

const SCOPE: &str = "registry:vehicle/owner";
const TEST_KEY_PEM: &[u8] = include_bytes!("fixtures/assertion_test_key.pem");

fn build_broker(server: &MockServer) -> TokenBroker {
	let token_endpoint = Url::parse(&server.url("/token"))
		.expect("Mock token endpoint should parse successfully.");

	TokenBroker::new(test_http_client(), test_assertion_config(token_endpoint), TEST_KEY_PEM)
		.expect("Live broker construction should succeed with the test key.")
}

#[tokio::test]
async fn tokens_are_cached_within_their_validity_window() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
				.body_includes("assertion=");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"cached-bearer\",\"expires_in\":1800}");
		})
		.await;
	let first =
		broker.get_token(SCOPE).await.expect("Initial token acquisition should succeed.");
	let second = broker.get_token(SCOPE).await.expect("Cached token reuse should succeed.");

	assert_eq!(first.secret.expose(), "cached-bearer");
	assert_eq!(second.secret.expose(), "cached-bearer");
	assert_eq!(first.scope, SCOPE);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_requests_share_one_grant() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"guard-bearer\",\"expires_in\":900}");
		})
		.await;
	let (first, second) = tokio::join!(broker.get_token(SCOPE), broker.get_token(SCOPE));
	let first = first.expect("First concurrent grant should succeed.");
	let second = second.expect("Second concurrent grant should succeed.");

	assert_eq!(first.secret.expose(), "guard-bearer");
	assert_eq!(second.secret.expose(), "guard-bearer");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn tokens_inside_the_expiry_margin_are_refreshed() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);
	// `expires_in` below the 30 s safety margin: every call must refresh.
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"short-bearer\",\"expires_in\":10}");
		})
		.await;

	broker.get_token(SCOPE).await.expect("First short-lived grant should succeed.");
	broker.get_token(SCOPE).await.expect("Second short-lived grant should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn rejected_assertions_surface_the_server_detail_unretried() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"unknown key id\"}");
		})
		.await;
	let err = broker
		.get_token(SCOPE)
		.await
		.expect_err("A rejected assertion should surface as an auth error.");

	match err {
		Error::Auth(AuthError::AssertionRejected { status, detail }) => {
			assert_eq!(status, 401);
			assert!(detail.contains("unknown key id"));
		},
		other => panic!("Expected AssertionRejected, got {other:?}."),
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn server_errors_map_to_upstream_not_auth() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("maintenance");
		})
		.await;

	let err = broker
		.get_token(SCOPE)
		.await
		.expect_err("A 5xx from the authorization server should fail the grant.");

	assert!(matches!(err, Error::Upstream { status: 503, .. }));
}

#[tokio::test]
async fn malformed_token_replies_surface_parse_errors() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"bearer\"}");
		})
		.await;

	let err = broker
		.get_token(SCOPE)
		.await
		.expect_err("A reply without expires_in should fail to parse.");

	assert!(matches!(err, Error::Auth(AuthError::TokenResponseParse { .. })));
}

#[tokio::test]
async fn a_failed_grant_does_not_wedge_the_singleflight_guard() {
	let server = MockServer::start_async().await;
	let broker = build_broker(&server);
	let failure = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).body("{\"error\":\"invalid_grant\"}");
		})
		.await;

	broker.get_token(SCOPE).await.expect_err("The first grant should be rejected.");
	failure.delete_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"recovered-bearer\",\"expires_in\":600}");
		})
		.await;

	let token = broker
		.get_token(SCOPE)
		.await
		.expect("A later grant should proceed once the server recovers.");

	assert_eq!(token.secret.expose(), "recovered-bearer");
}
