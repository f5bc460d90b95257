//! RFC 8693 token-exchange client built on reqwest.
//!
//! Requests are form-encoded POSTs against the descriptor's token endpoint. Redirects are
//! never followed because token endpoints answer directly. Responses are classified into
//! the relay's error taxonomy: upstream outages become [`NetworkError::Unavailable`],
//! OAuth error codes become [`Error::IssuerRejected`], and unparseable success bodies are
//! rejected with the JSON path that failed.

// crates.io
use reqwest::{
	StatusCode,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId, TokenSecret},
	cache::{Clock, SystemClock},
	error::{ConfigError, NetworkError, RejectionKind},
	issuer::{ClientAuthMethod, IssuerClient, IssuerDescriptor, IssuerFuture},
};

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
	access_token: String,
	#[serde(default)]
	issued_token_type: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Issuer client performing on-behalf-of exchanges over HTTPS.
pub struct ReqwestIssuerClient {
	descriptor: IssuerDescriptor,
	http: ReqwestClient,
	client_secret: Option<TokenSecret>,
	clock: Arc<dyn Clock>,
}
impl ReqwestIssuerClient {
	/// Builds a client with a dedicated reqwest instance that never follows redirects.
	pub fn new(descriptor: IssuerDescriptor) -> Result<Self> {
		let http = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self::with_client(descriptor, http))
	}

	/// Reuses an existing reqwest client; configure it to disable redirect following.
	pub fn with_client(descriptor: IssuerDescriptor, http: ReqwestClient) -> Self {
		Self { descriptor, http, client_secret: None, clock: Arc::new(SystemClock) }
	}

	/// Sets the secret used to authenticate the gateway.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the clock used to stamp issued tokens.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Descriptor this client talks to.
	pub fn descriptor(&self) -> &IssuerDescriptor {
		&self.descriptor
	}

	async fn perform(
		&self,
		principal: &PrincipalId,
		target: &DelegationTarget,
	) -> Result<DelegatedToken> {
		let descriptor = &self.descriptor;
		let mut form = vec![
			("grant_type", TOKEN_EXCHANGE_GRANT.to_owned()),
			("requested_subject", principal.to_string()),
			("audience", target.audience().to_owned()),
			("requested_token_type", descriptor.requested_token_type.clone()),
		];

		if let Some(scope) = target.scope_param() {
			form.push(("scope", scope));
		}
		if let Some(resource) = target.resource() {
			form.push(("resource", resource.to_string()));
		}

		let secret = self.client_secret.as_ref().map(|s| s.expose().to_owned());
		let mut request = self
			.http
			.post(descriptor.token_endpoint.clone())
			.timeout(descriptor.request_timeout.unsigned_abs());

		match descriptor.auth_method {
			ClientAuthMethod::ClientSecretBasic => {
				request = request.basic_auth(&descriptor.client_id, secret);
			},
			ClientAuthMethod::ClientSecretPost => {
				form.push(("client_id", descriptor.client_id.clone()));

				if let Some(secret) = secret {
					form.push(("client_secret", secret));
				}
			},
		}

		let response = request.form(&form).send().await.map_err(NetworkError::from)?;
		let status = response.status();
		let issued_at = self.clock.now();
		let retry_after = parse_retry_after(response.headers(), issued_at);
		let body = response.bytes().await.map_err(NetworkError::from)?;

		if !status.is_success() {
			return Err(classify_failure(status, retry_after, &body));
		}

		self.parse_success(principal, target, status, issued_at, &body)
	}

	fn parse_success(
		&self,
		principal: &PrincipalId,
		target: &DelegationTarget,
		status: StatusCode,
		issued_at: OffsetDateTime,
		body: &[u8],
	) -> Result<DelegatedToken> {
		let invalid = |reason: String| Error::IssuerRejected {
			kind: RejectionKind::InvalidResponse,
			reason,
			status: Some(status.as_u16()),
		};
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let parsed: ExchangeResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| invalid(format!("malformed token response at `{}`: {}", e.path(), e.inner())))?;
		let validity = match (parsed.expires_in, self.descriptor.default_validity) {
			(Some(secs), _) if secs > 0 => Duration::seconds(secs),
			(Some(secs), _) => return Err(invalid(format!("non-positive expires_in {secs}"))),
			(None, Some(validity)) => validity,
			(None, None) => return Err(invalid("token response is missing expires_in".into())),
		};
		let scopes = match parsed.scope {
			Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
			None => target.scopes().map(str::to_owned).collect::<Vec<_>>(),
		};
		let mut builder = DelegatedToken::builder(principal.clone(), target.clone())
			.token(parsed.access_token)
			.scopes(scopes)
			.issued_at(issued_at)
			.valid_for(validity);

		if let Some(token_type) = parsed.issued_token_type.or(parsed.token_type) {
			builder = builder.token_type(token_type);
		}

		builder.build().map_err(|e| invalid(e.to_string()))
	}
}
impl IssuerClient for ReqwestIssuerClient {
	fn exchange<'a>(
		&'a self,
		principal: &'a PrincipalId,
		target: &'a DelegationTarget,
	) -> IssuerFuture<'a> {
		Box::pin(self.perform(principal, target))
	}
}
impl Debug for ReqwestIssuerClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestIssuerClient")
			.field("descriptor", &self.descriptor)
			.field("client_secret", &self.client_secret)
			.finish()
	}
}

fn classify_failure(status: StatusCode, retry_after: Option<Duration>, body: &[u8]) -> Error {
	let parsed = serde_json::from_slice::<ErrorResponse>(body).ok();
	let code = parsed.as_ref().map(|p| p.error.as_str());
	let message = parsed
		.as_ref()
		.map(|p| p.error_description.clone().unwrap_or_else(|| p.error.clone()))
		.unwrap_or_else(|| status.canonical_reason().unwrap_or("unexpected status").to_owned());

	if status.is_server_error()
		|| status == StatusCode::TOO_MANY_REQUESTS
		|| code == Some("temporarily_unavailable")
	{
		return NetworkError::Unavailable { message, status: Some(status.as_u16()), retry_after }
			.into();
	}

	let kind = match code {
		Some("invalid_client" | "unauthorized_client") => RejectionKind::InvalidClient,
		Some("invalid_grant" | "access_denied") => RejectionKind::InvalidGrant,
		Some("invalid_request" | "invalid_scope" | "unsupported_grant_type") =>
			RejectionKind::InvalidRequest,
		Some("invalid_target") => RejectionKind::InvalidTarget,
		_ => match status {
			StatusCode::UNAUTHORIZED => RejectionKind::InvalidClient,
			StatusCode::FORBIDDEN => RejectionKind::InvalidGrant,
			_ => RejectionKind::InvalidRequest,
		},
	};

	Error::IssuerRejected { kind, reason: message, status: Some(status.as_u16()) }
}

fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - now;

	delta.is_positive().then_some(delta)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	use time::macros;
	// self
	use super::*;

	#[test]
	fn outages_map_to_unavailable() {
		for (status, body) in [
			(StatusCode::SERVICE_UNAVAILABLE, &b""[..]),
			(StatusCode::TOO_MANY_REQUESTS, &b"{}"[..]),
			(StatusCode::BAD_REQUEST, &br#"{"error":"temporarily_unavailable"}"#[..]),
		] {
			let err = classify_failure(status, Some(Duration::seconds(5)), body);

			assert!(
				matches!(
					err,
					Error::Network(NetworkError::Unavailable { retry_after: Some(d), .. })
						if d == Duration::seconds(5)
				),
				"{status} should be classified as an outage, got {err:?}."
			);
		}
	}

	#[test]
	fn oauth_codes_and_statuses_map_to_rejection_kinds() {
		let kind_of = |status, body: &[u8]| match classify_failure(status, None, body) {
			Error::IssuerRejected { kind, .. } => kind,
			other => panic!("Expected a rejection, got {other:?}."),
		};

		assert_eq!(
			kind_of(StatusCode::BAD_REQUEST, br#"{"error":"invalid_target"}"#),
			RejectionKind::InvalidTarget
		);
		assert_eq!(
			kind_of(StatusCode::BAD_REQUEST, br#"{"error":"access_denied"}"#),
			RejectionKind::InvalidGrant
		);
		assert_eq!(
			kind_of(StatusCode::BAD_REQUEST, br#"{"error":"invalid_scope"}"#),
			RejectionKind::InvalidRequest
		);
		assert_eq!(kind_of(StatusCode::UNAUTHORIZED, b"nope"), RejectionKind::InvalidClient);
		assert_eq!(kind_of(StatusCode::FORBIDDEN, b""), RejectionKind::InvalidGrant);
		assert_eq!(kind_of(StatusCode::NOT_FOUND, b""), RejectionKind::InvalidRequest);
	}

	#[test]
	fn rejection_prefers_the_issuer_description() {
		let err = classify_failure(
			StatusCode::BAD_REQUEST,
			None,
			br#"{"error":"invalid_grant","error_description":"subject is suspended"}"#,
		);

		assert!(matches!(
			err,
			Error::IssuerRejected { reason, status: Some(400), .. } if reason == "subject is suspended"
		));
	}

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let now = macros::datetime!(2025-06-01 09:00 UTC);
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));

		assert_eq!(parse_retry_after(&headers, now), Some(Duration::minutes(2)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Sun, 01 Jun 2025 09:00:30 +0000"));

		assert_eq!(parse_retry_after(&headers, now), Some(Duration::seconds(30)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Sun, 01 Jun 2025 08:00:00 +0000"));

		assert_eq!(parse_retry_after(&headers, now), None);
		assert_eq!(parse_retry_after(&HeaderMap::new(), now), None);
	}
}
