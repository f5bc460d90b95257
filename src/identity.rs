//! Principal extraction from already-validated inbound assertions.
//!
//! Signature and lifetime checks belong to the transport layer; extractors only map a
//! trusted assertion to the [`PrincipalId`] the relay caches under.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, PrincipalId},
};

/// Derives the principal for an inbound request.
///
/// Failures use the extractor's own error type; they are not relay faults.
pub trait IdentityExtractor<Request>
where
	Request: ?Sized,
{
	/// Extractor-specific failure.
	type Error;

	/// Returns the principal the request acts for.
	fn extract_principal(&self, request: &Request) -> Result<PrincipalId, Self::Error>;
}

/// Errors raised by [`ClaimExtractor`] and [`InboundAssertion::from_json`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ExtractionError {
	/// The assertion payload could not be decoded.
	#[error("Inbound assertion is malformed at `{path}`: {message}.")]
	Malformed {
		/// JSON path that failed to decode.
		path: String,
		/// Decoder message.
		message: String,
	},
	/// The configured claim is absent.
	#[error("Inbound assertion has no `{claim}` claim.")]
	MissingClaim {
		/// Claim name.
		claim: String,
	},
	/// The configured claim is not a string.
	#[error("Claim `{claim}` must be a string.")]
	NonStringClaim {
		/// Claim name.
		claim: String,
	},
	/// The claim value is not a valid principal.
	#[error("Claim `{claim}` is not a valid principal.")]
	InvalidPrincipal {
		/// Claim name.
		claim: String,
		/// Validation failure.
		#[source]
		source: IdentifierError,
	},
}

/// Decoded claims of an inbound assertion that the transport has already validated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundAssertion {
	/// Subject the assertion was issued for.
	#[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,
	/// Authority that issued the assertion.
	#[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
	pub issuer: Option<String>,
	/// Remaining claims.
	#[serde(flatten)]
	pub claims: BTreeMap<String, Value>,
}
impl InboundAssertion {
	/// Decodes a JSON claim set, reporting the failing path on error.
	pub fn from_json(raw: &str) -> Result<Self, ExtractionError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			ExtractionError::Malformed { path: e.path().to_string(), message: e.inner().to_string() }
		})
	}

	/// Looks up a claim by name, including `sub` and `iss`.
	pub fn claim(&self, name: &str) -> Option<Value> {
		match name {
			"sub" => self.subject.clone().map(Value::String),
			"iss" => self.issuer.clone().map(Value::String),
			_ => self.claims.get(name).cloned(),
		}
	}
}

/// Extracts the principal from a named string claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimExtractor {
	claim: String,
}
impl ClaimExtractor {
	/// Reads the principal from `claim` (for example `username`).
	pub fn new(claim: impl Into<String>) -> Self {
		Self { claim: claim.into() }
	}

	/// Claim this extractor reads.
	pub fn claim(&self) -> &str {
		&self.claim
	}
}
impl Default for ClaimExtractor {
	fn default() -> Self {
		Self::new("sub")
	}
}
impl IdentityExtractor<InboundAssertion> for ClaimExtractor {
	type Error = ExtractionError;

	fn extract_principal(&self, request: &InboundAssertion) -> Result<PrincipalId, Self::Error> {
		let claim = || self.claim.clone();
		let value =
			request.claim(&self.claim).ok_or_else(|| ExtractionError::MissingClaim { claim: claim() })?;
		let Value::String(raw) = value else {
			return Err(ExtractionError::NonStringClaim { claim: claim() });
		};

		PrincipalId::new(raw)
			.map_err(|source| ExtractionError::InvalidPrincipal { claim: claim(), source })
	}
}
