//! Byte counts as written in configuration files.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;

/// A number of bytes, parsed from either a plain integer or a string with a binary suffix.
///
/// ```rust
/// use tilestore_core::ByteSize;
///
/// assert_eq!(ByteSize::parse("64M").unwrap().as_usize(), 64 * 1024 * 1024);
/// assert_eq!(ByteSize::parse("1.5k").unwrap().as_u64(), 1536);
/// assert_eq!(ByteSize::parse("4096").unwrap().to_string(), "4K");
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[serde(try_from = "ByteSizeValue")]
pub struct ByteSize(u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteSizeValue {
	Number(u64),
	Text(String),
}

impl TryFrom<ByteSizeValue> for ByteSize {
	type Error = anyhow::Error;

	fn try_from(value: ByteSizeValue) -> Result<Self> {
		match value {
			ByteSizeValue::Number(bytes) => Ok(ByteSize(bytes)),
			ByteSizeValue::Text(text) => ByteSize::parse(&text),
		}
	}
}

const UNITS: [(char, u64); 4] = [('K', 1 << 10), ('M', 1 << 20), ('G', 1 << 30), ('T', 1 << 40)];

impl ByteSize {
	#[must_use]
	pub const fn new(bytes: u64) -> ByteSize {
		ByteSize(bytes)
	}

	#[must_use]
	pub const fn mib(count: u64) -> ByteSize {
		ByteSize(count << 20)
	}

	/// Parses `"512"`, `"64K"`, `"256 MB"`, `"1.5G"` and similar. Suffixes are base 1024.
	pub fn parse(text: &str) -> Result<ByteSize> {
		let trimmed = text.trim();
		let upper = trimmed.to_ascii_uppercase();
		let upper = upper.strip_suffix("IB").or_else(|| upper.strip_suffix('B')).unwrap_or(upper.as_str());

		let (number, factor) = match upper.chars().last() {
			Some(last) if last.is_ascii_alphabetic() => {
				let Some((_, factor)) = UNITS.iter().find(|(unit, _)| *unit == last) else {
					bail!("unknown size unit '{last}' in '{trimmed}'")
				};
				(&upper[..upper.len() - 1], *factor)
			}
			_ => (upper, 1),
		};

		let number: f64 = number
			.trim()
			.parse()
			.with_context(|| format!("invalid byte size '{trimmed}'"))?;
		if !number.is_finite() || number < 0.0 {
			bail!("invalid byte size '{trimmed}'")
		}
		Ok(ByteSize((number * factor as f64).round() as u64))
	}

	#[must_use]
	pub fn as_u64(&self) -> u64 {
		self.0
	}

	#[must_use]
	pub fn as_usize(&self) -> usize {
		self.0 as usize
	}
}

impl From<u64> for ByteSize {
	fn from(bytes: u64) -> Self {
		ByteSize(bytes)
	}
}

impl fmt::Display for ByteSize {
	/// Uses the largest unit that divides the value exactly.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (unit, factor) in UNITS.iter().rev() {
			if self.0 >= *factor && self.0 % factor == 0 {
				return write!(f, "{}{unit}", self.0 / factor);
			}
		}
		write!(f, "{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("0", 0)]
	#[case("1000", 1000)]
	#[case("1K", 1024)]
	#[case("2k", 2048)]
	#[case("256M", 268_435_456)]
	#[case("256 MB", 268_435_456)]
	#[case("1GiB", 1_073_741_824)]
	#[case("1T", 1_099_511_627_776)]
	#[case("0.5K", 512)]
	fn parse(#[case] text: &str, #[case] bytes: u64) {
		assert_eq!(ByteSize::parse(text).unwrap().as_u64(), bytes);
	}

	#[rstest]
	#[case("")]
	#[case("M")]
	#[case("12Q")]
	#[case("-4K")]
	#[case("lots")]
	fn parse_errors(#[case] text: &str) {
		assert!(ByteSize::parse(text).is_err(), "{text:?} should not parse");
	}

	#[test]
	fn display() {
		assert_eq!(ByteSize::new(100).to_string(), "100");
		assert_eq!(ByteSize::new(1536).to_string(), "1536");
		assert_eq!(ByteSize::mib(64).to_string(), "64M");
		assert_eq!(ByteSize::new(3 << 30).to_string(), "3G");
	}

	#[test]
	fn deserialize() {
		let sizes: Vec<ByteSize> = serde_yaml_ng::from_str("[4096, '8K', 1M]").unwrap();
		assert_eq!(sizes, vec![ByteSize::new(4096), ByteSize::new(8192), ByteSize::mib(1)]);
		assert!(serde_yaml_ng::from_str::<ByteSize>("12Q").is_err());
	}
}
