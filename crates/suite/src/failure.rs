/// Why a case or fixture step did not succeed.
///
/// Assertions count as failures; everything else counts as an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
	/// A check inside the step did not hold.
	#[error("assertion failed: {0}")]
	Assertion(String),
	/// A remote call made by the step failed.
	#[error(transparent)]
	Rpc(#[from] courier_rpc::Error),
	/// The step panicked.
	#[error("panicked: {0}")]
	Panicked(String),
}

impl Failure {
	/// Builds an assertion failure.
	pub fn assertion(message: impl Into<String>) -> Self {
		Self::Assertion(message.into())
	}

	/// Returns true for [`Failure::Assertion`].
	pub fn is_assertion(&self) -> bool {
		matches!(self, Self::Assertion(_))
	}
}
