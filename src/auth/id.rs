//! Strongly typed identifiers for principals and issuers.
//!
//! Principals come from upstream identity assertions and are treated as opaque: any
//! printable string is accepted as long as it has no surrounding whitespace, so
//! distinguished names such as `CN=alice, O=example` survive intact. Issuer identifiers are
//! configuration keys and stay whitespace-free.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $rule:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$rule.validate($kind, view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$rule.validate($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (principal, issuer).
		kind: &'static str,
	},
	/// The identifier contains whitespace where none is allowed.
	#[error("{kind} identifier contains disallowed whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (principal, issuer).
		kind: &'static str,
	},
	/// The identifier contains control characters.
	#[error("{kind} identifier contains control characters.")]
	ContainsControl {
		/// Kind of identifier (principal, issuer).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed byte length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (principal, issuer).
		kind: &'static str,
		/// Maximum permitted byte length.
		max: usize,
	},
}

struct Rule {
	max_len: usize,
	inner_whitespace: bool,
}
impl Rule {
	fn validate(&self, kind: &'static str, view: &str) -> Result<(), IdentifierError> {
		if view.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if view.chars().any(char::is_control) {
			return Err(IdentifierError::ContainsControl { kind });
		}

		let edge_whitespace = view.starts_with(char::is_whitespace)
			|| view.ends_with(char::is_whitespace);

		if edge_whitespace || (!self.inner_whitespace && view.contains(char::is_whitespace)) {
			return Err(IdentifierError::ContainsWhitespace { kind });
		}
		if view.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

const PRINCIPAL_RULE: Rule = Rule { max_len: 512, inner_whitespace: true };
const ISSUER_RULE: Rule = Rule { max_len: 128, inner_whitespace: false };

def_id! { PrincipalId, "Identity a delegated token is issued for; the cache key.", "Principal", PRINCIPAL_RULE }
def_id! { IssuerId, "Identifier for a configured trust authority.", "Issuer", ISSUER_RULE }
