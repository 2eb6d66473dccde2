//! Testing and assertion macros

/// Asserts that the string representation of an expression matches a wildcard pattern.
///
/// Handy for error messages that embed paths or identifiers that change between runs.
///
/// # Example
/// ```
/// use tilestore_core::assert_wildcard;
/// let message = "tile 01/000/000/000/000/000/003.bin is truncated";
/// assert_wildcard!(message, "tile * is truncated");
/// ```
#[macro_export]
macro_rules! assert_wildcard {
	($expression:expr, $wildcard:expr) => {
		let expression = format!("{}", $expression);
		if !$crate::wildmatch::WildMatch::new($wildcard).matches(&expression) {
			panic!(
				"assertion failed: expression \"{expression:?}\" does not match wildcard \"{}\"",
				$wildcard
			)
		}
	};
}

#[cfg(test)]
mod tests {
	#[test]
	fn matches_pattern() {
		assert_wildcard!("pool exhausted: 12 bytes requested", "pool exhausted: * requested");
	}

	#[test]
	#[should_panic(expected = "does not match wildcard")]
	fn rejects_mismatch() {
		assert_wildcard!("short read", "pool *");
	}
}
