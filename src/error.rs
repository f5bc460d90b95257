//! Relay-level error types shared across the cache, issuer clients, and the relay itself.
//!
//! Every variant is `Clone` because a single exchange outcome is handed to every caller
//! that joined the in-flight exchange for a principal.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// The issuer client is administratively turned off.
	#[error("Issuer client is disabled.")]
	IssuerDisabled,
	/// The issuer could not be reached or is temporarily unavailable.
	#[error(transparent)]
	Network(#[from] NetworkError),
	/// The issuer was reachable but refused the delegation exchange.
	#[error("Issuer rejected the delegation exchange ({kind}): {reason}.")]
	IssuerRejected {
		/// Classified rejection category.
		kind: RejectionKind,
		/// Issuer- or relay-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Builds an [`Error::IssuerRejected`] without HTTP metadata.
	pub fn rejected(kind: RejectionKind, reason: impl Into<String>) -> Self {
		Self::IssuerRejected { kind, reason: reason.into(), status: None }
	}

	/// Returns `true` when the failure means the issuer could not serve the exchange at all
	/// (disabled or unreachable), as opposed to an explicit rejection.
	pub fn is_issuer_unavailable(&self) -> bool {
		matches!(self, Self::IssuerDisabled | Self::Network(_))
	}
}

/// Categories an issuer rejection is classified into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
	/// Gateway credentials were refused (`invalid_client`, `unauthorized_client`).
	InvalidClient,
	/// The subject may not be delegated (`invalid_grant`, `access_denied`).
	InvalidGrant,
	/// The exchange request was malformed (`invalid_request`, `invalid_scope`).
	InvalidRequest,
	/// The requested audience is unknown to the issuer (`invalid_target`).
	InvalidTarget,
	/// The issuer answered with a payload the relay could not use.
	InvalidResponse,
}
impl RejectionKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RejectionKind::InvalidClient => "invalid_client",
			RejectionKind::InvalidGrant => "invalid_grant",
			RejectionKind::InvalidRequest => "invalid_request",
			RejectionKind::InvalidTarget => "invalid_target",
			RejectionKind::InvalidResponse => "invalid_response",
		}
	}
}
impl Display for RejectionKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Transport-level failures (network, timeouts, upstream outages).
#[derive(Clone, Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the issuer.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The issuer did not answer within the configured request timeout.
	#[error("Issuer request timed out.")]
	Timeout,
	/// The issuer answered but reported it cannot serve requests right now.
	#[error("Issuer is temporarily unavailable: {message}.")]
	Unavailable {
		/// Issuer-supplied message summarizing the outage.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for NetworkError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::transport(e) }
	}
}

/// Configuration and validation failures raised by the relay.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Issuer descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::issuer::IssuerDescriptorError),
	/// Delegated token builder validation failed.
	#[error("Unable to build delegated token.")]
	TokenBuild(#[from] crate::auth::DelegatedTokenBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn unavailable_classification_covers_disabled_and_network() {
		assert!(Error::IssuerDisabled.is_issuer_unavailable());
		assert!(Error::from(NetworkError::Timeout).is_issuer_unavailable());
		assert!(!Error::rejected(RejectionKind::InvalidGrant, "denied").is_issuer_unavailable());
	}

	#[test]
	fn cloned_network_errors_keep_their_source() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
		let error = Error::from(NetworkError::transport(io));
		let cloned = error.clone();
		let source = StdError::source(&cloned)
			.expect("Cloned network error should expose the transport failure.");

		assert_eq!(source.to_string(), "peer reset");
	}

	#[test]
	fn rejection_message_names_the_kind() {
		let error = Error::rejected(RejectionKind::InvalidTarget, "unknown audience");

		assert_eq!(
			error.to_string(),
			"Issuer rejected the delegation exchange (invalid_target): unknown audience."
		);
	}
}
