//! Issuer collaborators: the trust authority the relay exchanges assertions with.
//!
//! [`IssuerClient`] is the relay's only dependency on the issuer. [`GatedIssuer`] adds the
//! administrative on/off switch, and [`ReqwestIssuerClient`] (feature `reqwest`) speaks the
//! RFC 8693 token-exchange grant against an [`IssuerDescriptor`].

pub mod descriptor;
pub mod gate;
#[cfg(feature = "reqwest")] pub mod http;

pub use descriptor::*;
pub use gate::*;
#[cfg(feature = "reqwest")] pub use http::*;

// self
use crate::{
	_prelude::*,
	auth::{DelegatedToken, DelegationTarget, PrincipalId},
};

/// Boxed future returned by [`IssuerClient::exchange`].
pub type IssuerFuture<'a> = Pin<Box<dyn Future<Output = Result<DelegatedToken>> + 'a + Send>>;

/// Performs on-behalf-of exchanges with a trust authority.
///
/// Implementations must be safe to call concurrently for different principals and must
/// eventually resolve every future they return (success or failure); the relay imposes no
/// timeout of its own and callers for the same principal wait on the exchange.
pub trait IssuerClient
where
	Self: Send + Sync,
{
	/// Exchanges on behalf of `principal` for a token scoped to `target`.
	fn exchange<'a>(
		&'a self,
		principal: &'a PrincipalId,
		target: &'a DelegationTarget,
	) -> IssuerFuture<'a>;
}
impl<T> IssuerClient for Arc<T>
where
	T: ?Sized + IssuerClient,
{
	fn exchange<'a>(
		&'a self,
		principal: &'a PrincipalId,
		target: &'a DelegationTarget,
	) -> IssuerFuture<'a> {
		T::exchange(self, principal, target)
	}
}
