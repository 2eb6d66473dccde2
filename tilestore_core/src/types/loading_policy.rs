//! How a data container obtains and keeps its data.

use serde::Deserialize;
use std::fmt;

/// Loading strategy of a data container.
///
/// Parsing never fails: configuration values are matched case-insensitively and anything
/// unrecognised becomes [`LoadingPolicy::Memory`] with a warning.
///
/// ```rust
/// use tilestore_core::LoadingPolicy;
///
/// assert_eq!(LoadingPolicy::parse("CACHED"), LoadingPolicy::Cached);
/// assert_eq!(LoadingPolicy::parse("sometimes"), LoadingPolicy::Memory);
/// assert_eq!(LoadingPolicy::None.resolved(), LoadingPolicy::Memory);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(from = "String")]
pub enum LoadingPolicy {
	/// Same as [`LoadingPolicy::Memory`].
	None,
	/// Read everything when the reader is bound and keep it for the container's lifetime.
	#[default]
	Memory,
	/// Read on first access and keep it, without any memory budget.
	Lazy,
	/// Read on first access through the shared, budget-bounded tile cache.
	Cached,
}

impl LoadingPolicy {
	pub const ALL: [LoadingPolicy; 4] = [
		LoadingPolicy::None,
		LoadingPolicy::Memory,
		LoadingPolicy::Lazy,
		LoadingPolicy::Cached,
	];

	pub fn parse(text: &str) -> LoadingPolicy {
		match text.trim().to_ascii_lowercase().as_str() {
			"none" => LoadingPolicy::None,
			"memory" => LoadingPolicy::Memory,
			"lazy" => LoadingPolicy::Lazy,
			"cached" => LoadingPolicy::Cached,
			other => {
				log::warn!("unknown loading policy '{other}', falling back to 'memory'");
				LoadingPolicy::Memory
			}
		}
	}

	/// Collapses aliases, so `None` becomes `Memory`.
	#[must_use]
	pub fn resolved(self) -> LoadingPolicy {
		match self {
			LoadingPolicy::None => LoadingPolicy::Memory,
			other => other,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LoadingPolicy::None => "none",
			LoadingPolicy::Memory => "memory",
			LoadingPolicy::Lazy => "lazy",
			LoadingPolicy::Cached => "cached",
		}
	}
}

impl From<String> for LoadingPolicy {
	fn from(text: String) -> Self {
		LoadingPolicy::parse(&text)
	}
}

impl From<&str> for LoadingPolicy {
	fn from(text: &str) -> Self {
		LoadingPolicy::parse(text)
	}
}

impl fmt::Display for LoadingPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
