//! Issuer descriptor data structures and the validating builder used to assemble them.
//!
//! Descriptors are transport-agnostic configuration: they can be deserialized from a config
//! file or assembled in code, and both routes go through the same validation.

// self
use crate::{_prelude::*, auth::IssuerId};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum IssuerDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// The gateway must identify itself to the issuer.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Endpoints must use HTTPS.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// Fallback validity must be positive when configured.
	#[error("Default token validity must be positive.")]
	NonPositiveDefaultValidity,
}

/// Immutable issuer descriptor consumed by [`ReqwestIssuerClient`](crate::issuer::ReqwestIssuerClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IssuerDescriptorBuilder")]
pub struct IssuerDescriptor {
	/// Descriptor identifier.
	pub id: IssuerId,
	/// Token endpoint receiving exchange requests.
	pub token_endpoint: Url,
	/// Client identifier the gateway authenticates with.
	pub client_id: String,
	/// Client authentication mechanism.
	pub auth_method: ClientAuthMethod,
	/// Token type URN requested from the issuer.
	pub requested_token_type: String,
	/// Validity applied when the issuer omits `expires_in`; `None` rejects such responses.
	pub default_validity: Option<Duration>,
	/// Upper bound on a single exchange request.
	pub request_timeout: Duration,
}
impl IssuerDescriptor {
	/// Token type requested unless configured otherwise.
	pub const ACCESS_TOKEN_TYPE: &'static str = "urn:ietf:params:oauth:token-type:access_token";
	/// Request timeout applied unless configured otherwise.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder for the provided identifier.
	pub fn builder(id: IssuerId) -> IssuerDescriptorBuilder {
		IssuerDescriptorBuilder::new(id)
	}

	fn validate(&self) -> Result<(), IssuerDescriptorError> {
		if self.token_endpoint.scheme() != "https" {
			return Err(IssuerDescriptorError::InsecureEndpoint {
				url: self.token_endpoint.to_string(),
			});
		}
		if self.client_id.trim().is_empty() {
			return Err(IssuerDescriptorError::MissingClientId);
		}
		if !self.request_timeout.is_positive() {
			return Err(IssuerDescriptorError::NonPositiveTimeout);
		}
		if self.default_validity.is_some_and(|validity| !validity.is_positive()) {
			return Err(IssuerDescriptorError::NonPositiveDefaultValidity);
		}

		Ok(())
	}
}

/// Builder for [`IssuerDescriptor`] values; also the serde shape of a descriptor.
#[derive(Clone, Debug, Deserialize)]
pub struct IssuerDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: IssuerId,
	/// Token endpoint receiving exchange requests.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// Client identifier the gateway authenticates with.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Client authentication mechanism.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
	/// Token type URN requested from the issuer.
	#[serde(default)]
	pub requested_token_type: Option<String>,
	/// Validity applied when the issuer omits `expires_in`.
	#[serde(default)]
	pub default_validity: Option<Duration>,
	/// Upper bound on a single exchange request.
	#[serde(default)]
	pub request_timeout: Option<Duration>,
}
impl IssuerDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: IssuerId) -> Self {
		Self {
			id,
			token_endpoint: None,
			client_id: None,
			auth_method: ClientAuthMethod::default(),
			requested_token_type: None,
			default_validity: None,
			request_timeout: None,
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Overrides the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Overrides the requested token type URN.
	pub fn requested_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.requested_token_type = Some(token_type.into());

		self
	}

	/// Accepts responses without `expires_in`, treating them as valid for `validity`.
	pub fn default_validity(mut self, validity: Duration) -> Self {
		self.default_validity = Some(validity);

		self
	}

	/// Overrides the request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<IssuerDescriptor, IssuerDescriptorError> {
		let token_endpoint =
			self.token_endpoint.ok_or(IssuerDescriptorError::MissingTokenEndpoint)?;
		let client_id = self.client_id.ok_or(IssuerDescriptorError::MissingClientId)?;
		let descriptor = IssuerDescriptor {
			id: self.id,
			token_endpoint,
			client_id,
			auth_method: self.auth_method,
			requested_token_type: self
				.requested_token_type
				.unwrap_or_else(|| IssuerDescriptor::ACCESS_TOKEN_TYPE.into()),
			default_validity: self.default_validity,
			request_timeout: self.request_timeout.unwrap_or(IssuerDescriptor::DEFAULT_TIMEOUT),
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}
impl TryFrom<IssuerDescriptorBuilder> for IssuerDescriptor {
	type Error = IssuerDescriptorError;

	fn try_from(builder: IssuerDescriptorBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
