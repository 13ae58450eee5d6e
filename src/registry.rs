//! Upstream registry client: technical and owner fetches with typed error mapping.
//!
//! The registry's JSON schemas are not contractually guaranteed field-by-field, so
//! response bodies are parsed defensively: absent or structurally unexpected fields
//! normalize to empty strings instead of failing the lookup, and nested objects are
//! flattened through their known sub-keys. No retries happen here; retry policy belongs
//! to the caller, because blind retries on a 429 would compound the very problem the
//! upstream rate limiter exists to prevent.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSecret},
	error::{AuthError, TransportError},
	http::{HttpClient, detail_preview, parse_retry_after},
	query::LookupQuery,
};

/// Header carrying the registry API key for technical lookups.
const API_KEY_HEADER: &str = "SVV-Authorization";

/// Static configuration for the registry client.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
	/// Endpoint serving public technical vehicle data.
	pub technical_endpoint: Url,
	/// Endpoint serving sensitive owner data.
	pub owner_endpoint: Url,
	/// API key authenticating technical lookups.
	pub api_key: TokenSecret,
}
impl RegistryConfig {
	/// Creates a registry configuration.
	pub fn new(technical_endpoint: Url, owner_endpoint: Url, api_key: impl Into<String>) -> Self {
		Self { technical_endpoint, owner_endpoint, api_key: TokenSecret::new(api_key) }
	}
}

/// Public technical data for one vehicle.
///
/// Every field is a display-ready string; the registry's units and formats are passed
/// through as-is because their business semantics are out of scope here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
	/// Plate code.
	pub plate: String,
	/// Vehicle identification number.
	pub vin: String,
	/// Manufacturer.
	pub make: String,
	/// Model designation.
	pub model: String,
	/// First registration date.
	pub first_registered: String,
	/// Engine power.
	pub engine_power: String,
	/// Vehicle weight.
	pub weight: String,
	/// Tyre and rim dimensions.
	pub tyre_dimensions: String,
	/// Date of the last periodic inspection.
	pub last_inspection: String,
	/// Deadline for the next periodic inspection.
	pub next_inspection_due: String,
}
impl VehicleRecord {
	/// Extracts a record from an upstream payload, tolerating missing or oddly shaped
	/// fields.
	pub fn from_value(value: &Value) -> Self {
		Self {
			plate: field(value, &["kjennemerke"]),
			vin: field(value, &["vin", "understellsnummer"]),
			make: field(value, &["merke"]),
			model: field(value, &["modell"]),
			first_registered: field(value, &["first_reg_date", "forstegangsregistrert"]),
			engine_power: field(value, &["motoreffekt"]),
			weight: field(value, &["vekt"]),
			tyre_dimensions: field(value, &["dekk_felg"]),
			last_inspection: field(value, &["eu_kontroll_sist"]),
			next_inspection_due: field(value, &["eu_frister"]),
		}
	}
}

/// Sensitive owner data for one vehicle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
	/// Registered owner's name.
	pub name: String,
	/// Owner's registered municipality.
	pub municipality: String,
	/// Upstream timestamp for the ownership snapshot.
	pub retrieved_at: String,
}
impl OwnerRecord {
	/// Extracts a record from an upstream payload, tolerating missing or oddly shaped
	/// fields.
	pub fn from_value(value: &Value) -> Self {
		Self {
			name: field(value, &["navn"]),
			municipality: field(value, &["kommune"]),
			retrieved_at: field(value, &["timestamp"]),
		}
	}
}

/// Performs upstream fetches against the vehicle registry.
#[derive(Debug)]
pub struct RegistryClient {
	http: HttpClient,
	config: RegistryConfig,
}
impl RegistryClient {
	/// Creates a client for the configured endpoints.
	pub fn new(http: HttpClient, config: RegistryConfig) -> Self {
		Self { http, config }
	}

	/// Fetches public technical data, authenticating with the registry API key.
	pub async fn fetch_technical(&self, query: &LookupQuery) -> Result<VehicleRecord> {
		let request = self
			.http
			.get(self.config.technical_endpoint.clone())
			.header(API_KEY_HEADER, format!("Apikey {}", self.config.api_key.expose()))
			.query(&[(query_param(query), query.as_str())]);
		let body = self.dispatch(request).await?;

		Ok(VehicleRecord::from_value(&body))
	}

	/// Fetches sensitive owner data, authenticating with a bearer token supplied by the
	/// token broker.
	pub async fn fetch_owner(
		&self,
		query: &LookupQuery,
		token: &AccessToken,
	) -> Result<OwnerRecord> {
		let request = self
			.http
			.get(self.config.owner_endpoint.clone())
			.bearer_auth(token.secret.expose())
			.query(&[(query_param(query), query.as_str())]);
		let body = self.dispatch(request).await?;

		Ok(OwnerRecord::from_value(&body))
	}

	/// Sends a request and maps the HTTP outcome to typed errors.
	///
	/// - 401 → [`AuthError::TokenRejected`]: re-auth required, never retried silently.
	/// - 429 → [`Error::UpstreamRateLimited`]: the caller should surface a
	///   wait-and-retry message, not loop.
	/// - Other non-2xx → [`Error::Upstream`] with status and raw detail.
	/// - Transport failure/timeout → [`TransportError`].
	async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<Value> {
		let response = request.send().await.map_err(TransportError::from)?;
		let status = response.status();

		if status.as_u16() == 401 {
			return Err(AuthError::TokenRejected.into());
		}
		if status.as_u16() == 429 {
			let retry_after = parse_retry_after(response.headers());

			return Err(Error::UpstreamRateLimited { retry_after });
		}

		let headers_ok = status.is_success();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if !headers_ok {
			return Err(Error::Upstream {
				status: status.as_u16(),
				detail: detail_preview(&bytes),
			});
		}

		// A body that is not JSON at all normalizes to an empty record downstream.
		Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}
}

fn query_param(query: &LookupQuery) -> &'static str {
	if query.is_vin() { "understellsnummer" } else { "kjennemerke" }
}

/// Looks `keys` up in order and coerces the first hit into a flat string.
///
/// Strings pass through; numbers and booleans are stringified; objects are flattened
/// via their known sub-keys (`effekt`, `egenvekt`) or serialized whole as a last
/// resort, mirroring upstream payloads that nest units inside sub-objects.
fn field(value: &Value, keys: &[&str]) -> String {
	let Some(object) = value.as_object() else {
		return String::new();
	};

	for key in keys {
		let Some(found) = object.get(*key) else {
			continue;
		};

		match found {
			Value::String(text) => return text.clone(),
			Value::Number(number) => return number.to_string(),
			Value::Bool(flag) => return flag.to_string(),
			Value::Object(nested) =>
				for sub_key in ["effekt", "egenvekt"] {
					if let Some(Value::String(text)) = nested.get(sub_key) {
						return text.clone();
					}
				},
			Value::Null | Value::Array(_) => continue,
		}

		return serde_json::to_string(found).unwrap_or_default();
	}

	String::new()
}
