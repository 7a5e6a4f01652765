mod common;

use common::{count_row, scalar_row, ScriptedExecutor};
use grappelli::config::BatchConfig;
use grappelli::dialect::{registry, RowModifier};
use grappelli::error::Result;
use grappelli::meta::{ColumnMeta, ColumnType, EntityMeta, FieldValues, PkStrategy};
use grappelli::template::{QueryInvocation, SqlTemplate};
use grappelli::types::{DialectKey, QueryValue, Row};
use rstest::rstest;

fn order_meta(pk_strategy: PkStrategy) -> EntityMeta {
	EntityMeta {
		table: "orders".to_string(),
		columns: vec![
			ColumnMeta::new("id", ColumnType::Int),
			ColumnMeta::new("status", ColumnType::String),
		],
		pk_columns: vec!["id".to_string()],
		pk_strategy,
		sequence: None,
		generator: None,
		allow_explicit_key: true,
	}
}

fn order_row(id: i64, status: &str) -> FieldValues {
	[
		("id".to_string(), QueryValue::Int(id)),
		("status".to_string(), QueryValue::from(status)),
	]
	.into_iter()
	.collect()
}

#[tokio::test]
async fn test_postgres_page_fetch_renders_dollar_placeholders() {
	let executor = ScriptedExecutor::new(DialectKey::Postgres);
	let strategy = registry::strategy(DialectKey::Postgres);
	let template = SqlTemplate::builder(
		"orders.list",
		"select * from orders where status = :status",
	)
	.build()
	.unwrap();
	let invocation =
		QueryInvocation::new(vec!["status".to_string()], vec![QueryValue::from("OPEN")]).unwrap();

	strategy
		.find_page(&executor, &template, &invocation, 2, 10)
		.await
		.unwrap();

	let calls = executor.logged();
	assert_eq!(calls.len(), 1);
	assert_eq!(
		calls[0].sql,
		"select * from orders where status = $1 limit $2 offset $3"
	);
	assert_eq!(
		calls[0].params,
		vec![
			QueryValue::from("OPEN"),
			QueryValue::Int(10),
			QueryValue::Int(10)
		]
	);
}

#[tokio::test]
async fn test_grouped_query_count_wraps_body() {
	let executor = ScriptedExecutor::new(DialectKey::MySql).with_fetch_one(count_row(42));
	let strategy = registry::strategy(DialectKey::MySql);
	let template = SqlTemplate::builder(
		"orders.by_region",
		"select region, count(1) total from orders where status = :status group by region",
	)
	.build()
	.unwrap();
	let invocation =
		QueryInvocation::new(vec!["status".to_string()], vec![QueryValue::from("OPEN")]).unwrap();

	let total = strategy.count(&executor, &template, &invocation).await.unwrap();
	assert_eq!(total, 42);

	let calls = executor.logged();
	assert!(calls[0].sql.starts_with("select count(1) from ("));
	assert_eq!(calls[0].params, vec![QueryValue::from("OPEN")]);
}

#[tokio::test]
async fn test_identity_save_reads_returned_key() {
	let executor = ScriptedExecutor::new(DialectKey::Postgres)
		.with_fetch_all(vec![scalar_row("id", QueryValue::Int(7))]);
	let strategy = registry::strategy(DialectKey::Postgres);
	let meta = order_meta(PkStrategy::Identity);
	let row: FieldValues = [("status".to_string(), QueryValue::from("OPEN"))]
		.into_iter()
		.collect();

	let key = strategy.save(&executor, &meta, row, None).await.unwrap();
	assert_eq!(key, Some(QueryValue::Int(7)));

	let calls = executor.logged();
	assert_eq!(
		calls[0].sql,
		"insert into orders (status) values ($1) returning id"
	);
}

#[tokio::test]
async fn test_upsert_routes_missed_updates_to_insert() {
	let executor =
		ScriptedExecutor::new(DialectKey::MySql).with_each_counts(vec![1, 0, 1]);
	let strategy = registry::strategy(DialectKey::MySql);
	let meta = order_meta(PkStrategy::Assigned);
	let rows = vec![
		order_row(1, "OPEN"),
		order_row(2, "OPEN"),
		order_row(3, "CLOSED"),
	];

	let outcome = strategy
		.save_or_update_all(&executor, &meta, rows, None, &BatchConfig::default())
		.await
		.unwrap();

	assert_eq!(outcome.updated, 2);
	assert_eq!(outcome.inserted, 1);
	assert_eq!(outcome.total(), 3);

	let calls = executor.logged();
	assert!(calls[0].sql.starts_with("update orders set status = ifnull("));
	assert!(calls
		.iter()
		.any(|c| c.sql.starts_with("insert ignore into orders")));
}

#[tokio::test]
async fn test_upsert_without_insert_ignore_falls_back_to_plain_insert() {
	let executor =
		ScriptedExecutor::new(DialectKey::SybaseIq).with_each_counts(vec![0]);
	let strategy = registry::strategy(DialectKey::SybaseIq);
	let meta = order_meta(PkStrategy::Assigned);

	let outcome = strategy
		.save_or_update_all(
			&executor,
			&meta,
			vec![order_row(4, "OPEN")],
			None,
			&BatchConfig::default(),
		)
		.await
		.unwrap();

	assert_eq!(outcome.updated, 0);
	assert_eq!(outcome.inserted, 1);

	// no conflict-ignoring form exists, so the missed row goes through a
	// plain insert
	let insert = executor
		.logged()
		.into_iter()
		.find(|c| c.sql.starts_with("insert into orders"))
		.unwrap();
	assert!(!insert.sql.contains("ignore"));
}

#[tokio::test]
async fn test_save_all_flushes_in_chunks() {
	let executor = ScriptedExecutor::new(DialectKey::MySql);
	let strategy = registry::strategy(DialectKey::MySql);
	let meta = order_meta(PkStrategy::Assigned);
	let rows: Vec<FieldValues> = (1..=5).map(|i| order_row(i, "OPEN")).collect();
	let mut config = BatchConfig::default();
	config.chunk_size = 2;

	let total = strategy
		.save_all(&executor, &meta, rows, None, &config)
		.await
		.unwrap();
	assert_eq!(total, 5);

	let flushes: Vec<usize> = executor
		.logged()
		.iter()
		.filter(|c| c.kind == "execute_many")
		.map(|c| c.rows)
		.collect();
	assert_eq!(flushes, vec![2, 2, 1]);
}

#[tokio::test]
async fn test_is_unique_probe() {
	let executor = ScriptedExecutor::new(DialectKey::Postgres)
		.with_fetch_one(count_row(0))
		.with_fetch_one(count_row(2));
	let strategy = registry::strategy(DialectKey::Postgres);
	let meta = order_meta(PkStrategy::Assigned);
	let row: FieldValues = [("status".to_string(), QueryValue::from("OPEN"))]
		.into_iter()
		.collect();
	let unique = vec!["status".to_string()];

	assert!(strategy.is_unique(&executor, &meta, &row, &unique).await.unwrap());
	assert!(!strategy.is_unique(&executor, &meta, &row, &unique).await.unwrap());
}

struct CloseOrders;

impl RowModifier for CloseOrders {
	fn update_row(&self, row: &mut Row) -> Result<bool> {
		row.insert("status".to_string(), QueryValue::from("CLOSED"));
		Ok(true)
	}
}

#[tokio::test]
async fn test_update_and_fetch_locks_then_writes_back() {
	let mut locked = Row::new();
	locked.insert("id".to_string(), QueryValue::Int(1));
	locked.insert("status".to_string(), QueryValue::from("OPEN"));
	let executor = ScriptedExecutor::new(DialectKey::Postgres).with_fetch_all(vec![locked]);
	let strategy = registry::strategy(DialectKey::Postgres);
	let meta = order_meta(PkStrategy::Assigned);
	let template = SqlTemplate::builder("orders.one", "select * from orders where id = :id")
		.build()
		.unwrap();
	let invocation =
		QueryInvocation::new(vec!["id".to_string()], vec![QueryValue::Int(1)]).unwrap();

	let rows = strategy
		.update_and_fetch(&executor, &meta, &template, &invocation, &CloseOrders)
		.await
		.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].value("status"), Some(&QueryValue::from("CLOSED")));

	let calls = executor.logged();
	assert!(calls[0].sql.ends_with("for update"));
	assert_eq!(calls[1].kind, "execute");
	assert_eq!(
		calls[1].sql,
		"update orders set status = $1 where id = $2"
	);
	assert_eq!(
		calls[1].params,
		vec![QueryValue::from("CLOSED"), QueryValue::Int(1)]
	);
}

#[rstest]
#[case(DialectKey::MySql, "limit :gp_page_offset, :gp_page_limit")]
#[case(DialectKey::Postgres, "limit :gp_page_limit offset :gp_page_offset")]
#[case(DialectKey::Oracle, "offset :gp_page_offset rows fetch next :gp_page_limit rows only")]
#[case(DialectKey::Oracle11, "rownum <= :gp_page_limit")]
#[case(DialectKey::SqlServer, "order by (select null) offset :gp_page_offset rows")]
#[case(DialectKey::Db2, "offset :gp_page_offset rows fetch next :gp_page_limit rows only")]
#[case(DialectKey::Sqlite, "limit :gp_page_limit offset :gp_page_offset")]
#[case(DialectKey::ClickHouse, "limit :gp_page_offset, :gp_page_limit")]
#[case(DialectKey::SybaseIq, "rn_t > :gp_page_offset")]
#[case(DialectKey::Unknown, "offset :gp_page_offset rows fetch next :gp_page_limit rows only")]
fn test_paging_syntax_per_dialect(#[case] dialect: DialectKey, #[case] fragment: &str) {
	let sql = registry::strategy(dialect)
		.paging_sql("select * from orders")
		.unwrap();
	assert!(
		sql.contains(fragment),
		"{dialect}: `{sql}` missing `{fragment}`"
	);
}
