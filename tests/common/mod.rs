#![allow(dead_code)]

use async_trait::async_trait;
use grappelli::error::{DialectError, Result};
use grappelli::executor::SqlExecutor;
use grappelli::types::{DialectKey, QueryResult, QueryValue, Row};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// One statement the executor was handed
#[derive(Debug, Clone)]
pub struct Call {
	pub kind: &'static str,
	pub sql: String,
	pub params: Vec<QueryValue>,
	/// Bound row count, for multi-row calls
	pub rows: usize,
}

/// Test double with scripted responses and a call log
pub struct ScriptedExecutor {
	dialect: DialectKey,
	pub calls: Mutex<Vec<Call>>,
	fetch_all_queue: Mutex<VecDeque<Vec<Row>>>,
	fetch_one_queue: Mutex<VecDeque<Row>>,
	execute_queue: Mutex<VecDeque<QueryResult>>,
	each_counts_queue: Mutex<VecDeque<Vec<u64>>>,
	fetch_all_failures: Mutex<VecDeque<String>>,
	fetch_one_failures: Mutex<VecDeque<String>>,
	delay: Option<Duration>,
}

impl ScriptedExecutor {
	pub fn new(dialect: DialectKey) -> Self {
		Self {
			dialect,
			calls: Mutex::new(Vec::new()),
			fetch_all_queue: Mutex::new(VecDeque::new()),
			fetch_one_queue: Mutex::new(VecDeque::new()),
			execute_queue: Mutex::new(VecDeque::new()),
			each_counts_queue: Mutex::new(VecDeque::new()),
			fetch_all_failures: Mutex::new(VecDeque::new()),
			fetch_one_failures: Mutex::new(VecDeque::new()),
			delay: None,
		}
	}

	pub fn with_fetch_all(self, rows: Vec<Row>) -> Self {
		self.fetch_all_queue.lock().push_back(rows);
		self
	}

	pub fn with_fetch_one(self, row: Row) -> Self {
		self.fetch_one_queue.lock().push_back(row);
		self
	}

	pub fn with_execute(self, result: QueryResult) -> Self {
		self.execute_queue.lock().push_back(result);
		self
	}

	pub fn with_each_counts(self, counts: Vec<u64>) -> Self {
		self.each_counts_queue.lock().push_back(counts);
		self
	}

	/// Script the next `fetch_all` to fail with a driver error
	pub fn with_fetch_all_failure(self, message: &str) -> Self {
		self.fetch_all_failures.lock().push_back(message.to_string());
		self
	}

	/// Script the next `fetch_one` to fail with a driver error
	pub fn with_fetch_one_failure(self, message: &str) -> Self {
		self.fetch_one_failures.lock().push_back(message.to_string());
		self
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn logged(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	fn log(&self, kind: &'static str, sql: &str, params: &[QueryValue], rows: usize) {
		self.calls.lock().push(Call {
			kind,
			sql: sql.to_string(),
			params: params.to_vec(),
			rows,
		});
	}

	async fn pause(&self) {
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
	}
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
	fn dialect(&self) -> DialectKey {
		self.dialect
	}

	async fn execute(&self, sql: &str, params: &[QueryValue]) -> Result<QueryResult> {
		self.pause().await;
		self.log("execute", sql, params, 1);
		Ok(self
			.execute_queue
			.lock()
			.pop_front()
			.unwrap_or_else(|| QueryResult::affected(1)))
	}

	async fn fetch_all(&self, sql: &str, params: &[QueryValue]) -> Result<Vec<Row>> {
		self.pause().await;
		self.log("fetch_all", sql, params, 0);
		if let Some(message) = self.fetch_all_failures.lock().pop_front() {
			return Err(DialectError::Database(sqlx::Error::Protocol(message)));
		}
		Ok(self.fetch_all_queue.lock().pop_front().unwrap_or_default())
	}

	async fn fetch_one(&self, sql: &str, params: &[QueryValue]) -> Result<Row> {
		self.pause().await;
		self.log("fetch_one", sql, params, 0);
		if let Some(message) = self.fetch_one_failures.lock().pop_front() {
			return Err(DialectError::Database(sqlx::Error::Protocol(message)));
		}
		Ok(self.fetch_one_queue.lock().pop_front().unwrap_or_default())
	}

	async fn execute_many(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<u64> {
		self.pause().await;
		self.log("execute_many", sql, &[], rows.len());
		Ok(rows.len() as u64)
	}

	async fn execute_each(&self, sql: &str, rows: &[Vec<QueryValue>]) -> Result<Vec<u64>> {
		self.pause().await;
		self.log("execute_each", sql, &[], rows.len());
		Ok(self
			.each_counts_queue
			.lock()
			.pop_front()
			.unwrap_or_else(|| vec![1; rows.len()]))
	}
}

/// Single-column row, for count results and generated keys
pub fn scalar_row(name: &str, value: QueryValue) -> Row {
	let mut row = Row::new();
	row.insert(name.to_string(), value);
	row
}

pub fn count_row(total: i64) -> Row {
	scalar_row("ct", QueryValue::Int(total))
}
