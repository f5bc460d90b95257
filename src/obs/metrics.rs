// self
use crate::obs::DelegationOutcome;

/// Records a relay outcome via the global metrics recorder (when enabled).
pub fn record_delegation_outcome(outcome: DelegationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("obo_relay_delegation_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_delegation_outcome_noop_without_recorder() {
		record_delegation_outcome(DelegationOutcome::Failure);
	}
}
