//! Immutable delegated token model, freshness helpers, and builder.

// self
use crate::{
	_prelude::*,
	auth::{DelegationTarget, PrincipalId, token::secret::TokenSecret},
};

/// Freshness of a delegated token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// `now < issued_at + validity`; the token may be handed to callers.
	Active,
	/// The validity window has elapsed (the boundary instant counts as elapsed).
	Expired,
}

/// Errors produced by [`DelegatedTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DelegatedTokenBuilderError {
	/// Issued when no token payload was provided.
	#[error("Delegated token payload is required.")]
	MissingToken,
	/// Issued when neither a validity duration nor an absolute expiry was configured.
	#[error("Validity must be supplied via valid_for or expires_at.")]
	MissingValidity,
	/// Issued when the expiry does not lie after the issuance instant.
	#[error("Delegated token validity must be positive.")]
	NonPositiveValidity,
	/// Issued when the expiry instant cannot be represented.
	#[error("Delegated token expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Credential obtained from an on-behalf-of exchange for one principal.
///
/// Deserialization goes through [`DelegatedTokenBuilder`], so a decoded token upholds the
/// same invariants as a built one.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "DelegatedTokenFields")]
pub struct DelegatedToken {
	principal: PrincipalId,
	target: DelegationTarget,
	token: TokenSecret,
	token_type: Option<String>,
	scopes: Vec<String>,
	issued_at: OffsetDateTime,
	validity: Duration,
	expires_at: OffsetDateTime,
}
impl DelegatedToken {
	/// Returns a builder for a token issued to `principal` for `target`.
	pub fn builder(principal: PrincipalId, target: DelegationTarget) -> DelegatedTokenBuilder {
		DelegatedTokenBuilder::new(principal, target)
	}

	/// Principal the token acts on behalf of.
	pub fn principal(&self) -> &PrincipalId {
		&self.principal
	}

	/// Target (audience, scopes, resource) the token was requested for.
	pub fn target(&self) -> &DelegationTarget {
		&self.target
	}

	/// Audience the token is scoped to.
	pub fn audience(&self) -> &str {
		self.target.audience()
	}

	/// Opaque credential payload; callers must avoid logging it.
	pub fn token(&self) -> &TokenSecret {
		&self.token
	}

	/// Issued token type URN reported by the issuer, if any.
	pub fn token_type(&self) -> Option<&str> {
		self.token_type.as_deref()
	}

	/// Scopes granted by the issuer.
	pub fn scopes(&self) -> &[String] {
		&self.scopes
	}

	/// Issuance instant.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Validity window measured from [`issued_at`](Self::issued_at).
	pub fn validity(&self) -> Duration {
		self.validity
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Computes the status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant < self.expires_at { TokenStatus::Active } else { TokenStatus::Expired }
	}

	/// Returns `true` if the token may still be handed out at `instant`.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Time left before expiry at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for DelegatedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DelegatedToken")
			.field("principal", &self.principal)
			.field("target", &self.target)
			.field("token", &self.token.fingerprint())
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Deserialize)]
struct DelegatedTokenFields {
	principal: PrincipalId,
	target: DelegationTarget,
	token: TokenSecret,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	scopes: Vec<String>,
	issued_at: OffsetDateTime,
	validity: Duration,
}
impl TryFrom<DelegatedTokenFields> for DelegatedToken {
	type Error = DelegatedTokenBuilderError;

	fn try_from(fields: DelegatedTokenFields) -> Result<Self, Self::Error> {
		let mut builder = DelegatedToken::builder(fields.principal, fields.target)
			.token(fields.token.expose())
			.scopes(fields.scopes)
			.issued_at(fields.issued_at)
			.valid_for(fields.validity);

		if let Some(token_type) = fields.token_type {
			builder = builder.token_type(token_type);
		}

		builder.build()
	}
}

/// Builder for [`DelegatedToken`].
#[derive(Clone, Debug)]
pub struct DelegatedTokenBuilder {
	principal: PrincipalId,
	target: DelegationTarget,
	token: Option<TokenSecret>,
	token_type: Option<String>,
	scopes: Vec<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	valid_for: Option<Duration>,
}
impl DelegatedTokenBuilder {
	fn new(principal: PrincipalId, target: DelegationTarget) -> Self {
		Self {
			principal,
			target,
			token: None,
			token_type: None,
			scopes: Vec::new(),
			issued_at: None,
			expires_at: None,
			valid_for: None,
		}
	}

	/// Provides the credential payload.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(TokenSecret::new(token));

		self
	}

	/// Records the issued token type URN.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Records the scopes granted by the issuer.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Sets the issuance instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the validity window measured from the issuance instant.
	pub fn valid_for(mut self, duration: Duration) -> Self {
		self.valid_for = Some(duration);

		self
	}

	/// Sets an absolute expiry instant; takes precedence over [`valid_for`](Self::valid_for).
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`DelegatedToken`].
	pub fn build(self) -> Result<DelegatedToken, DelegatedTokenBuilderError> {
		let token = self.token.ok_or(DelegatedTokenBuilderError::MissingToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let (validity, expires_at) = match (self.expires_at, self.valid_for) {
			(Some(instant), _) => (instant - issued_at, instant),
			(None, Some(duration)) => (
				duration,
				issued_at
					.checked_add(duration)
					.ok_or(DelegatedTokenBuilderError::ExpiryOutOfRange)?,
			),
			(None, None) => return Err(DelegatedTokenBuilderError::MissingValidity),
		};

		if !validity.is_positive() {
			return Err(DelegatedTokenBuilderError::NonPositiveValidity);
		}

		Ok(DelegatedToken {
			principal: self.principal,
			target: self.target,
			token,
			token_type: self.token_type,
			scopes: self.scopes,
			issued_at,
			validity,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn alice() -> PrincipalId {
		PrincipalId::new("alice").expect("Principal fixture should be valid.")
	}

	fn backend() -> DelegationTarget {
		DelegationTarget::new("urn:backend").expect("Target fixture should be valid.")
	}

	#[test]
	fn boundary_instant_counts_as_expired() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = DelegatedToken::builder(alice(), backend())
			.token("assertion")
			.issued_at(issued)
			.valid_for(Duration::minutes(5))
			.build()
			.expect("Delegated token builder should succeed.");

		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:04:59 UTC)), TokenStatus::Active);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:05 UTC)), TokenStatus::Expired);
		assert!(!token.is_usable_at(token.expires_at()));
		assert_eq!(token.remaining_at(macros::datetime!(2025-01-01 00:06 UTC)), Duration::ZERO);
	}

	#[test]
	fn absolute_expiry_derives_validity() {
		let token = DelegatedToken::builder(alice(), backend())
			.token("assertion")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(macros::datetime!(2025-01-01 00:30 UTC))
			.build()
			.expect("Delegated token builder should support absolute expiry.");

		assert_eq!(token.validity(), Duration::minutes(30));
	}

	#[test]
	fn builder_rejects_missing_or_empty_validity() {
		let missing = DelegatedToken::builder(alice(), backend()).token("assertion").build();

		assert_eq!(missing.err(), Some(DelegatedTokenBuilderError::MissingValidity));

		let zero = DelegatedToken::builder(alice(), backend())
			.token("assertion")
			.valid_for(Duration::ZERO)
			.build();

		assert_eq!(zero.err(), Some(DelegatedTokenBuilderError::NonPositiveValidity));

		let no_payload =
			DelegatedToken::builder(alice(), backend()).valid_for(Duration::MINUTE).build();

		assert_eq!(no_payload.err(), Some(DelegatedTokenBuilderError::MissingToken));
	}

	#[test]
	fn debug_output_redacts_the_payload() {
		let token = DelegatedToken::builder(alice(), backend())
			.token("very-secret-assertion")
			.valid_for(Duration::MINUTE)
			.build()
			.expect("Delegated token builder should succeed.");

		assert!(!format!("{token:?}").contains("very-secret-assertion"));
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		let huge = DelegatedToken::builder(alice(), backend())
			.token("assertion")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.valid_for(Duration::seconds(i64::MAX))
			.build();

		assert_eq!(huge.err(), Some(DelegatedTokenBuilderError::ExpiryOutOfRange));
	}

	#[test]
	fn deserialization_runs_builder_validation() {
		let token = DelegatedToken::builder(alice(), backend())
			.token("assertion")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.valid_for(Duration::minutes(5))
			.build()
			.expect("Delegated token builder should succeed.");
		let mut encoded = serde_json::to_value(&token).expect("Token should serialize.");
		let decoded: DelegatedToken =
			serde_json::from_value(encoded.clone()).expect("Valid token should deserialize.");

		assert_eq!(decoded.expires_at(), token.expires_at());
		assert_eq!(decoded.target(), token.target());

		encoded["validity"] =
			serde_json::to_value(Duration::ZERO).expect("Duration should serialize.");

		let err = serde_json::from_value::<DelegatedToken>(encoded)
			.expect_err("Zero validity must be refused on decode.");

		assert!(err.to_string().contains("validity must be positive"));
	}
}
