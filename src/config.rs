//! Engine configuration
//!
//! Plain serde-deserializable structs with sensible defaults; the embedding
//! application decides where the values come from.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Behavior when a requested page lies beyond the last page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOverflowPolicy {
	/// Return an empty page (default)
	#[default]
	Empty,
	/// Re-run the request against page 1
	SnapToFirst,
}

/// Paged-query orchestration settings
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
	/// Wait ceiling for the forked count+fetch join
	#[serde(with = "duration_millis")]
	pub parallel_timeout: Duration,

	/// Run count and page-fetch concurrently when eligible
	pub parallel_enabled: bool,

	/// Hard cap on rows returned by a "all rows" (page −1) request
	pub all_rows_limit: u64,

	/// What to do when the requested page exceeds the last page
	pub overflow_policy: PageOverflowPolicy,

	/// Snap the reported page number to 1 when the result is empty
	pub snap_page_no_on_empty: bool,
}

impl Default for PageConfig {
	fn default() -> Self {
		Self {
			parallel_timeout: Duration::from_secs(30),
			parallel_enabled: true,
			all_rows_limit: 100_000,
			overflow_policy: PageOverflowPolicy::Empty,
			snap_page_no_on_empty: false,
		}
	}
}

/// Batch execution settings
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
	/// Rows flushed per batch execution
	pub chunk_size: usize,

	/// Auto-commit override applied for the duration of the batch;
	/// the previous mode is always restored
	pub auto_commit: Option<bool>,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			chunk_size: 200,
			auto_commit: None,
		}
	}
}

mod duration_millis {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		Ok(Duration::from_millis(u64::deserialize(d)?))
	}
}
