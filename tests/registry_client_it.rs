// crates.io
use httpmock::prelude::*;
// self
use reglookup::{
	_preludet::*,
	auth::AccessToken,
	error::AuthError,
	query::LookupQuery,
	registry::RegistryClient,
};

fn build_client(server: &MockServer) -> RegistryClient {
	let technical = Url::parse(&server.url("/technical"))
		.expect("Mock technical endpoint should parse successfully.");
	let owner =
		Url::parse(&server.url("/owner")).expect("Mock owner endpoint should parse successfully.");

	test_registry_client(technical, owner)
}

fn plate() -> LookupQuery {
	LookupQuery::parse("EL12345").expect("Plate fixture should be valid.")
}

fn bearer(token: &str) -> AccessToken {
	let now = OffsetDateTime::now_utc();

	AccessToken::new(token, TEST_SCOPE, now, now + Duration::minutes(10))
}

#[tokio::test]
async fn technical_fetches_authenticate_with_the_api_key() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/technical")
				.header("SVV-Authorization", "Apikey demo-key-123")
				.query_param("kjennemerke", "EL12345");
			then.status(200).header("content-type", "application/json").body(
				"{\"kjennemerke\":\"EL12345\",\"merke\":\"Volvo\",\"modell\":\"XC40\",\"vekt\":{\"egenvekt\":\"1800 kg\"}}",
			);
		})
		.await;
	let record = client
		.fetch_technical(&plate())
		.await
		.expect("Technical fetch should succeed against the mock registry.");

	assert_eq!(record.plate, "EL12345");
	assert_eq!(record.make, "Volvo");
	assert_eq!(record.weight, "1800 kg", "Nested weight objects should flatten.");
	assert_eq!(record.vin, "", "Absent fields normalize to empty strings.");

	mock.assert_async().await;
}

#[tokio::test]
async fn vin_fetches_use_the_vin_query_parameter() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let vin = LookupQuery::parse("WVWZZZ1JZXW000001").expect("VIN fixture should be valid.");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/technical")
				.query_param("understellsnummer", "WVWZZZ1JZXW000001");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"vin\":\"WVWZZZ1JZXW000001\"}");
		})
		.await;
	let record = client.fetch_technical(&vin).await.expect("VIN fetch should succeed.");

	assert_eq!(record.vin, "WVWZZZ1JZXW000001");

	mock.assert_async().await;
}

#[tokio::test]
async fn owner_fetches_send_the_bearer_token() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/owner")
				.header("authorization", "Bearer owner-bearer")
				.query_param("kjennemerke", "EL12345");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"navn\":\"OLA NORDMANN\",\"kommune\":\"Bergen\"}");
		})
		.await;
	let record = client
		.fetch_owner(&plate(), &bearer("owner-bearer"))
		.await
		.expect("Owner fetch should succeed against the mock registry.");

	assert_eq!(record.name, "OLA NORDMANN");
	assert_eq!(record.municipality, "Bergen");
	assert_eq!(record.retrieved_at, "");

	mock.assert_async().await;
}

#[tokio::test]
async fn a_401_maps_to_token_rejected() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/owner");
			then.status(401);
		})
		.await;

	let err = client
		.fetch_owner(&plate(), &bearer("stale-bearer"))
		.await
		.expect_err("A 401 must surface as a token rejection.");

	assert!(matches!(err, Error::Auth(AuthError::TokenRejected)));
}

#[tokio::test]
async fn a_429_maps_to_rate_limited_with_retry_hint() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/technical");
			then.status(429).header("retry-after", "60");
		})
		.await;

	let err = client
		.fetch_technical(&plate())
		.await
		.expect_err("A 429 must surface as an upstream rate limit.");

	match err {
		Error::UpstreamRateLimited { retry_after } =>
			assert_eq!(retry_after, Some(Duration::seconds(60))),
		other => panic!("Expected UpstreamRateLimited, got {other:?}."),
	}
}

#[tokio::test]
async fn other_statuses_map_to_upstream_with_detail() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/technical");
			then.status(502).body("bad gateway upstream");
		})
		.await;

	let err = client
		.fetch_technical(&plate())
		.await
		.expect_err("A 5xx must surface as an upstream error.");

	match err {
		Error::Upstream { status, detail } => {
			assert_eq!(status, 502);
			assert!(detail.contains("bad gateway"));
		},
		other => panic!("Expected Upstream, got {other:?}."),
	}
}

#[tokio::test]
async fn non_json_bodies_normalize_to_empty_records() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/technical");
			then.status(200).body("<html>not json</html>");
		})
		.await;

	let record = client
		.fetch_technical(&plate())
		.await
		.expect("A non-JSON success body should still produce a record.");

	assert_eq!(record.plate, "");
	assert_eq!(record.make, "");
}
