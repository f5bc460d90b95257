//! Delegation targets: the downstream audience a delegated token must be scoped to.

// self
use crate::_prelude::*;

/// Errors emitted when validating a delegation target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TargetError {
	/// The audience was empty or whitespace.
	#[error("Delegation audience cannot be empty.")]
	EmptyAudience,
	/// Scope entries cannot be empty or contain whitespace.
	#[error("Delegation scope is invalid: {scope:?}.")]
	InvalidScope {
		/// The offending scope string.
		scope: String,
	},
}

/// Downstream audience, optional scopes, and optional resource indicator for an exchange.
///
/// Scopes are deduplicated and kept sorted so two targets naming the same scopes in a
/// different order compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationTarget {
	audience: String,
	#[serde(default)]
	scopes: BTreeSet<String>,
	#[serde(default)]
	resource: Option<Url>,
}
impl DelegationTarget {
	/// Creates a target for `audience` with no scopes.
	pub fn new(audience: impl Into<String>) -> Result<Self, TargetError> {
		let audience = audience.into();

		if audience.trim().is_empty() {
			return Err(TargetError::EmptyAudience);
		}

		Ok(Self { audience, scopes: BTreeSet::new(), resource: None })
	}

	/// Adds scopes the delegated token should carry.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Result<Self, TargetError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		for scope in scopes {
			let scope = scope.into();

			if scope.is_empty() || scope.contains(char::is_whitespace) {
				return Err(TargetError::InvalidScope { scope });
			}

			self.scopes.insert(scope);
		}

		Ok(self)
	}

	/// Sets the RFC 8707 resource indicator sent alongside the audience.
	pub fn with_resource(mut self, resource: Url) -> Self {
		self.resource = Some(resource);

		self
	}

	/// Audience the token is scoped to.
	pub fn audience(&self) -> &str {
		&self.audience
	}

	/// Requested scopes in sorted order.
	pub fn scopes(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(String::as_str)
	}

	/// Optional resource indicator.
	pub fn resource(&self) -> Option<&Url> {
		self.resource.as_ref()
	}

	/// Space-delimited scope parameter, or `None` when no scopes were requested.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() {
			return None;
		}

		Some(self.scopes().collect::<Vec<_>>().join(" "))
	}
}
impl Display for DelegationTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.audience)
	}
}
