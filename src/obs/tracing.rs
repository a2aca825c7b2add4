// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Instrumented future when tracing is enabled, the bare future otherwise.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Instrumented future when tracing is enabled, the bare future otherwise.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `storefront_session.flow` span carrying `flow`, `stage`, and the settled `outcome`.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for one run of `kind` at `stage`; `outcome` is filled in on settle.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		return Self {
			span: tracing::info_span!(
				"storefront_session.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
			),
		};
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span; no guard is held across its `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Stamps the settled outcome onto the span.
	pub fn record_outcome(&self, outcome: FlowOutcome) {
		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());
		#[cfg(not(feature = "tracing"))]
		let _ = outcome;
	}
}

/// Emits a `warn` event for a failure the session swallowed (fail-open logout, mirror writes) or
/// fanned out to every waiter (refresh).
pub fn warn_absorbed(kind: FlowKind, what: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(flow = kind.as_str(), error = %error, "{what}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, what, error);
}
