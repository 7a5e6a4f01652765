//! Paged-query orchestration
//!
//! Coordinates the count and page-fetch halves of a paged request: cached
//! totals skip the count entirely, eligible templates fork both halves
//! concurrently under a join deadline, and the total is reconciled against
//! what the fetch actually returned, since rows can be inserted or deleted
//! between the two statements.

use crate::cache::PageCountCache;
use crate::config::{PageConfig, PageOverflowPolicy};
use crate::dialect::DialectStrategy;
use crate::error::{DialectError, Result};
use crate::executor::SqlExecutor;
use crate::template::{QueryInvocation, SqlTemplate};
use crate::types::Row;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sentinel page number requesting every row
pub const ALL_ROWS: i64 = -1;

/// One paged-query request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	/// 1-based page number, or [`ALL_ROWS`]
	pub page_no: i64,
	pub page_size: u64,
	/// Skip the count branch; the result's total is only set when the
	/// fetched page happens to pin it
	pub skip_total_count: bool,
}

impl PageRequest {
	pub fn new(page_no: i64, page_size: u64) -> Self {
		Self {
			page_no,
			page_size,
			skip_total_count: false,
		}
	}

	pub fn all_rows() -> Self {
		Self::new(ALL_ROWS, 0)
	}

	pub fn skip_total_count(mut self) -> Self {
		self.skip_total_count = true;
		self
	}
}

/// One page of results plus the (possibly reconciled) total
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
	pub page_no: u64,
	pub page_size: u64,
	/// Total matching rows across all pages; `None` when the count was
	/// skipped and the page could not pin it
	pub total: Option<u64>,
	pub rows: Vec<Row>,
	pub elapsed: Duration,
}

impl PageResult {
	pub fn total_pages(&self) -> Option<u64> {
		let total = self.total?;
		if self.page_size == 0 {
			return Some(if total > 0 { 1 } else { 0 });
		}
		Some(total.div_ceil(self.page_size))
	}
}

/// Coordinates count + fetch for paged requests
pub struct PagedQueryOrchestrator {
	config: PageConfig,
	cache: Option<Arc<dyn PageCountCache>>,
}

impl PagedQueryOrchestrator {
	pub fn new(config: PageConfig) -> Self {
		Self {
			config,
			cache: None,
		}
	}

	pub fn with_cache(mut self, cache: Arc<dyn PageCountCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	/// Run one paged request
	pub async fn find_page(
		&self,
		strategy: Arc<dyn DialectStrategy>,
		executor: Arc<dyn SqlExecutor>,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		request: PageRequest,
	) -> Result<PageResult> {
		let started = Instant::now();
		if request.page_no == ALL_ROWS {
			return self
				.find_all_rows(strategy, executor, template, invocation, started)
				.await;
		}
		if request.page_no < 1 || request.page_size == 0 {
			return Err(DialectError::Configuration(format!(
				"illegal page bounds: page_no={}, page_size={}",
				request.page_no, request.page_size
			)));
		}
		let page_no = request.page_no as u64;
		let page_size = request.page_size;
		let offset = (page_no - 1) * page_size;

		if request.skip_total_count {
			let rows = strategy
				.find_page(executor.as_ref(), template, invocation, page_no, page_size)
				.await?;
			let returned = rows.len() as u64;
			// A short page pins the total; a full one proves nothing more
			let total = if returned < page_size && (returned > 0 || page_no == 1) {
				Some(offset + returned)
			} else {
				None
			};
			return Ok(self.assemble(page_no, page_size, total, rows, started));
		}

		let optimize = template.page_optimize();
		let cache_key = match (optimize, &self.cache) {
			(Some(policy), Some(_)) if policy.enabled => {
				Some(total_cache_key(template, strategy.as_ref(), invocation)?)
			}
			_ => None,
		};

		// A live cached total replaces the count branch entirely
		if let Some(key) = &cache_key
			&& let Some(cache) = &self.cache
			&& let Some(cached_total) = cache.get(key)
		{
			let rows = strategy
				.find_page(executor.as_ref(), template, invocation, page_no, page_size)
				.await?;
			return Ok(self.finish(
				template,
				cache_key.as_deref(),
				page_no,
				page_size,
				cached_total,
				rows,
				started,
			));
		}

		let parallel = self.config.parallel_enabled
			&& optimize.map(|p| p.parallel).unwrap_or(false);

		let (total, rows) = if parallel {
			let wait = optimize
				.and_then(|p| p.timeout)
				.unwrap_or(self.config.parallel_timeout);
			self.forked_count_and_fetch(
				strategy.clone(),
				executor.clone(),
				template,
				invocation,
				page_no,
				page_size,
				wait,
			)
			.await?
		} else {
			let total = strategy.count(executor.as_ref(), template, invocation).await?;
			if total == 0 {
				return Ok(self.assemble(page_no, page_size, Some(0), Vec::new(), started));
			}
			if offset >= total {
				return match self.config.overflow_policy {
					PageOverflowPolicy::Empty => {
						Ok(self.assemble(page_no, page_size, Some(total), Vec::new(), started))
					}
					PageOverflowPolicy::SnapToFirst => {
						let rows = strategy
							.find_page(executor.as_ref(), template, invocation, 1, page_size)
							.await?;
						Ok(self.finish(
							template,
							cache_key.as_deref(),
							1,
							page_size,
							total,
							rows,
							started,
						))
					}
				};
			}
			let rows = strategy
				.find_page(executor.as_ref(), template, invocation, page_no, page_size)
				.await?;
			(total, rows)
		};

		// Parallel branches cannot pre-check overflow; resolve it here
		if rows.is_empty() && offset >= total {
			return match self.config.overflow_policy {
				PageOverflowPolicy::Empty => {
					Ok(self.assemble(page_no, page_size, Some(total), Vec::new(), started))
				}
				PageOverflowPolicy::SnapToFirst if total > 0 => {
					let rows = strategy
						.find_page(executor.as_ref(), template, invocation, 1, page_size)
						.await?;
					Ok(self.finish(
						template,
						cache_key.as_deref(),
						1,
						page_size,
						total,
						rows,
						started,
					))
				}
				PageOverflowPolicy::SnapToFirst => {
					Ok(self.assemble(page_no, page_size, Some(0), Vec::new(), started))
				}
			};
		}

		Ok(self.finish(
			template,
			cache_key.as_deref(),
			page_no,
			page_size,
			total,
			rows,
			started,
		))
	}

	async fn find_all_rows(
		&self,
		strategy: Arc<dyn DialectStrategy>,
		executor: Arc<dyn SqlExecutor>,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		started: Instant,
	) -> Result<PageResult> {
		let total = strategy.count(executor.as_ref(), template, invocation).await?;
		if total > self.config.all_rows_limit {
			tracing::warn!(
				template = template.id(),
				total,
				limit = self.config.all_rows_limit,
				"all-rows request over the safety cap; returning an empty page"
			);
			return Ok(PageResult {
				page_no: 1,
				page_size: total.max(1),
				total: Some(total),
				rows: Vec::new(),
				elapsed: started.elapsed(),
			});
		}
		let rows = strategy.find(executor.as_ref(), template, invocation).await?;
		let total = rows.len() as u64;
		Ok(PageResult {
			page_no: 1,
			page_size: total.max(1),
			total: Some(total),
			rows,
			elapsed: started.elapsed(),
		})
	}

	#[allow(clippy::too_many_arguments)]
	async fn forked_count_and_fetch(
		&self,
		strategy: Arc<dyn DialectStrategy>,
		executor: Arc<dyn SqlExecutor>,
		template: &SqlTemplate,
		invocation: &QueryInvocation,
		page_no: u64,
		page_size: u64,
		wait: Duration,
	) -> Result<(u64, Vec<Row>)> {
		let count_handle = {
			let strategy = strategy.clone();
			let executor = executor.clone();
			let template = template.clone();
			let invocation = invocation.clone();
			tokio::spawn(async move {
				strategy
					.count(executor.as_ref(), &template, &invocation)
					.await
			})
		};
		let fetch_handle = {
			let template = template.clone();
			let invocation = invocation.clone();
			tokio::spawn(async move {
				strategy
					.find_page(executor.as_ref(), &template, &invocation, page_no, page_size)
					.await
			})
		};

		let joined = tokio::time::timeout(wait, async {
			tokio::join!(count_handle, fetch_handle)
		})
		.await;
		let (count_res, fetch_res) = match joined {
			Ok(pair) => pair,
			Err(_) => return Err(DialectError::ParallelTimeout(wait)),
		};

		let total = count_res?.map_err(|e| DialectError::ParallelBranch {
			branch: "count",
			message: e.to_string(),
		})?;
		let rows = fetch_res?.map_err(|e| DialectError::ParallelBranch {
			branch: "fetch",
			message: e.to_string(),
		})?;
		Ok((total, rows))
	}

	/// Reconcile the total against the fetched page and register it in the
	/// cache
	#[allow(clippy::too_many_arguments)]
	fn finish(
		&self,
		template: &SqlTemplate,
		cache_key: Option<&str>,
		page_no: u64,
		page_size: u64,
		total: u64,
		rows: Vec<Row>,
		started: Instant,
	) -> PageResult {
		let corrected = reconcile_total(total, page_no, page_size, rows.len());
		if corrected != total {
			tracing::warn!(
				template = template.id(),
				reported = total,
				corrected,
				"page total disagreed with fetched rows; corrected"
			);
		}
		if let (Some(key), Some(cache)) = (cache_key, &self.cache) {
			let alive = template
				.page_optimize()
				.map(|p| p.alive)
				.unwrap_or(Duration::from_secs(300));
			if corrected != total {
				cache.invalidate(key);
			}
			cache.put(key.to_string(), corrected, alive);
		}
		self.assemble(page_no, page_size, Some(corrected), rows, started)
	}

	fn assemble(
		&self,
		page_no: u64,
		page_size: u64,
		total: Option<u64>,
		rows: Vec<Row>,
		started: Instant,
	) -> PageResult {
		let page_no = if rows.is_empty() && self.config.snap_page_no_on_empty {
			1
		} else {
			page_no
		};
		PageResult {
			page_no,
			page_size,
			total,
			rows,
			elapsed: started.elapsed(),
		}
	}
}

/// Reconcile the reported total against what the page actually held
///
/// A short page pins the total exactly at `offset + returned`. A full page
/// only proves the total is at least that. An empty page proves the total
/// lies at or below the offset; a reported total above it would claim rows
/// the fetch just showed are not there.
fn reconcile_total(total: u64, page_no: u64, page_size: u64, returned: usize) -> u64 {
	let offset = (page_no - 1) * page_size;
	let floor = offset + returned as u64;
	if returned == 0 {
		total.min(floor)
	} else if (returned as u64) < page_size {
		floor
	} else {
		total.max(floor)
	}
}

/// Cache key: template id + dialect + bound parameters, name-sorted
fn total_cache_key(
	template: &SqlTemplate,
	strategy: &dyn DialectStrategy,
	invocation: &QueryInvocation,
) -> Result<String> {
	let params = invocation.param_map(template)?;
	let mut pairs: Vec<(String, String)> = params
		.iter()
		.map(|(k, v)| (k.clone(), v.describe()))
		.collect();
	pairs.sort();
	let rendered: Vec<String> = pairs
		.into_iter()
		.map(|(k, v)| format!("{}={}", k, v))
		.collect();
	Ok(format!(
		"{}@{}?{}",
		template.id(),
		strategy.key(),
		rendered.join("&")
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reconcile_short_page_pins_total() {
		// page 3 of size 10 returned 4 rows: exactly 24 rows exist
		assert_eq!(reconcile_total(100, 3, 10, 4), 24);
	}

	#[test]
	fn test_reconcile_full_page_is_lower_bound() {
		assert_eq!(reconcile_total(5, 2, 10, 10), 20);
		assert_eq!(reconcile_total(35, 2, 10, 10), 35);
	}

	#[test]
	fn test_reconcile_empty_page_clamps_to_offset() {
		// total claims rows the empty fetch disproved
		assert_eq!(reconcile_total(100, 2, 10, 0), 10);
		// total already at or below the offset stays put
		assert_eq!(reconcile_total(12, 9, 10, 0), 12);
	}

	#[test]
	fn test_total_pages() {
		let result = PageResult {
			page_no: 1,
			page_size: 10,
			total: Some(31),
			rows: vec![],
			elapsed: Duration::ZERO,
		};
		assert_eq!(result.total_pages(), Some(4));
	}
}
