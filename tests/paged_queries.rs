mod common;

use common::{count_row, scalar_row, ScriptedExecutor};
use grappelli::cache::InMemoryPageCountCache;
use grappelli::config::{PageConfig, PageOverflowPolicy};
use grappelli::dialect::registry;
use grappelli::error::DialectError;
use grappelli::page::{PageRequest, PagedQueryOrchestrator};
use grappelli::template::{PageOptimize, QueryInvocation, SqlTemplate};
use grappelli::types::{DialectKey, QueryValue, Row};
use std::sync::Arc;
use std::time::Duration;

fn template(optimize: Option<PageOptimize>) -> SqlTemplate {
	let builder = SqlTemplate::builder(
		"orders.page",
		"select * from orders where status = :status",
	);
	let builder = match optimize {
		Some(policy) => builder.page_optimize(policy),
		None => builder,
	};
	builder.build().unwrap()
}

fn invocation() -> QueryInvocation {
	QueryInvocation::new(vec!["status".to_string()], vec![QueryValue::from("OPEN")]).unwrap()
}

fn rows(n: usize) -> Vec<Row> {
	(0..n)
		.map(|i| scalar_row("id", QueryValue::Int(i as i64)))
		.collect()
}

#[tokio::test]
async fn test_cached_total_skips_count() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(10))
			.with_fetch_all(rows(2))
			.with_fetch_all(rows(2)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default())
		.with_cache(Arc::new(InMemoryPageCountCache::default()));
	let template = template(Some(PageOptimize::default()));
	let invocation = invocation();

	let first = orchestrator
		.find_page(
			strategy.clone(),
			executor.clone(),
			&template,
			&invocation,
			PageRequest::new(1, 2),
		)
		.await
		.unwrap();
	assert_eq!(first.total, Some(10));

	let second = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template,
			&invocation,
			PageRequest::new(2, 2),
		)
		.await
		.unwrap();
	assert_eq!(second.total, Some(10));

	// one count across both requests
	let count_calls = executor
		.logged()
		.iter()
		.filter(|c| c.kind == "fetch_one")
		.count();
	assert_eq!(count_calls, 1);
}

#[tokio::test]
async fn test_short_page_corrects_stale_total() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(100))
			.with_fetch_all(rows(4)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor,
			&template(None),
			&invocation(),
			PageRequest::new(3, 10),
		)
		.await
		.unwrap();

	// page 3 of size 10 came back short: exactly 24 rows exist
	assert_eq!(result.total, Some(24));
	assert_eq!(result.total_pages(), Some(3));
}

#[tokio::test]
async fn test_overflow_returns_empty_page() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres).with_fetch_one(count_row(5)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(None),
			&invocation(),
			PageRequest::new(3, 10),
		)
		.await
		.unwrap();

	assert!(result.rows.is_empty());
	assert_eq!(result.total, Some(5));
	// the fetch never ran
	assert_eq!(executor.logged().len(), 1);
}

#[tokio::test]
async fn test_overflow_snaps_to_first_page() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(5))
			.with_fetch_all(rows(5)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let mut config = PageConfig::default();
	config.overflow_policy = PageOverflowPolicy::SnapToFirst;
	let orchestrator = PagedQueryOrchestrator::new(config);

	let result = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(None),
			&invocation(),
			PageRequest::new(9, 10),
		)
		.await
		.unwrap();

	assert_eq!(result.page_no, 1);
	assert_eq!(result.rows.len(), 5);
	assert_eq!(result.total, Some(5));
	// the re-fetch bound page 1 values: limit 10, offset 0
	let fetch = executor
		.logged()
		.into_iter()
		.find(|c| c.kind == "fetch_all")
		.unwrap();
	assert_eq!(
		fetch.params,
		vec![
			QueryValue::from("OPEN"),
			QueryValue::Int(10),
			QueryValue::Int(0)
		]
	);
}

#[tokio::test]
async fn test_skip_total_count_pins_total_on_short_page() {
	let executor =
		Arc::new(ScriptedExecutor::new(DialectKey::Postgres).with_fetch_all(rows(3)));
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(None),
			&invocation(),
			PageRequest::new(2, 10).skip_total_count(),
		)
		.await
		.unwrap();

	assert_eq!(result.total, Some(13));
	assert_eq!(executor.logged().len(), 1);
}

#[tokio::test]
async fn test_skip_total_count_full_page_leaves_total_unknown() {
	let executor =
		Arc::new(ScriptedExecutor::new(DialectKey::Postgres).with_fetch_all(rows(10)));
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor,
			&template(None),
			&invocation(),
			PageRequest::new(2, 10).skip_total_count(),
		)
		.await
		.unwrap();

	assert_eq!(result.total, None);
	assert_eq!(result.total_pages(), None);
}

#[tokio::test]
async fn test_all_rows_request() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(3))
			.with_fetch_all(rows(3)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor,
			&template(None),
			&invocation(),
			PageRequest::all_rows(),
		)
		.await
		.unwrap();

	assert_eq!(result.page_no, 1);
	assert_eq!(result.total, Some(3));
	assert_eq!(result.rows.len(), 3);
}

#[tokio::test]
async fn test_all_rows_request_over_cap_returns_empty_page() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres).with_fetch_one(count_row(5)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let mut config = PageConfig::default();
	config.all_rows_limit = 2;
	let orchestrator = PagedQueryOrchestrator::new(config);

	let result = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(None),
			&invocation(),
			PageRequest::all_rows(),
		)
		.await
		.unwrap();

	assert!(result.rows.is_empty());
	assert_eq!(result.total, Some(5));
	// the full fetch never ran
	assert_eq!(executor.logged().len(), 1);
}

#[tokio::test]
async fn test_empty_page_within_range_pins_total_at_offset() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres).with_fetch_one(count_row(100)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());

	let result = orchestrator
		.find_page(
			strategy,
			executor,
			&template(None),
			&invocation(),
			PageRequest::new(2, 10),
		)
		.await
		.unwrap();

	// count said 100 but page 2 came back empty: only page 1 exists
	assert!(result.rows.is_empty());
	assert_eq!(result.total, Some(10));
}

#[tokio::test]
async fn test_parallel_fork_joins_both_branches() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(30))
			.with_fetch_all(rows(10)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());
	let optimize = PageOptimize {
		enabled: false,
		parallel: true,
		alive: Duration::from_secs(60),
		timeout: None,
	};

	let result = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(Some(optimize)),
			&invocation(),
			PageRequest::new(1, 10),
		)
		.await
		.unwrap();

	assert_eq!(result.total, Some(30));
	assert_eq!(result.rows.len(), 10);
	assert_eq!(executor.logged().len(), 2);
}

#[tokio::test]
async fn test_parallel_fork_times_out() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one(count_row(30))
			.with_fetch_all(rows(10))
			.with_delay(Duration::from_millis(300)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());
	let optimize = PageOptimize {
		enabled: false,
		parallel: true,
		alive: Duration::from_secs(60),
		timeout: Some(Duration::from_millis(50)),
	};

	let err = orchestrator
		.find_page(
			strategy,
			executor,
			&template(Some(optimize)),
			&invocation(),
			PageRequest::new(1, 10),
		)
		.await
		.unwrap_err();
	assert!(matches!(err, DialectError::ParallelTimeout(_)));
}

#[tokio::test]
async fn test_parallel_fork_surfaces_count_branch_failure() {
	let executor = Arc::new(
		ScriptedExecutor::new(DialectKey::Postgres)
			.with_fetch_one_failure("count exploded")
			.with_fetch_all(rows(10)),
	);
	let strategy = registry::strategy(DialectKey::Postgres);
	let orchestrator = PagedQueryOrchestrator::new(PageConfig::default());
	let optimize = PageOptimize {
		enabled: false,
		parallel: true,
		alive: Duration::from_secs(60),
		timeout: None,
	};

	let err = orchestrator
		.find_page(
			strategy,
			executor.clone(),
			&template(Some(optimize)),
			&invocation(),
			PageRequest::new(1, 10),
		)
		.await
		.unwrap_err();

	// the count failure wins; the fetched rows are discarded
	assert!(matches!(
		err,
		DialectError::ParallelBranch { branch: "count", .. }
	));
	assert_eq!(executor.logged().len(), 2);
}
