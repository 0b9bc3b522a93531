//! In-memory [`QueryDriver`] double that records every statement.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use graphmap_core::cypher::NODE_ALIAS;

use crate::driver::{Params, QueryDriver, ResultElement, ResultRow};
use crate::error::{GraphError, Result};

#[derive(Default)]
pub struct RecordingDriver {
    executed: Mutex<Vec<(String, Params)>>,
    fetch_results: Mutex<VecDeque<Vec<ResultRow>>>,
    conflicts: Mutex<usize>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `fetch` call. Unqueued fetches return
    /// nothing.
    pub fn push_fetch(&self, elements: Vec<ResultElement>) {
        self.push_rows(
            elements
                .into_iter()
                .map(|e| ResultRow::single(NODE_ALIAS, e))
                .collect(),
        );
    }

    /// Queue multi-column rows for the next fetch.
    pub fn push_rows(&self, rows: Vec<ResultRow>) {
        self.fetch_results.lock().unwrap().push_back(rows);
    }

    /// Make the next `run` fail as a uniqueness violation.
    pub fn conflict_next_run(&self) {
        *self.conflicts.lock().unwrap() += 1;
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn executed(&self) -> Vec<(String, Params)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl QueryDriver for RecordingDriver {
    async fn run(&self, statement: &str, params: Params) -> Result<()> {
        self.executed
            .lock()
            .unwrap()
            .push((statement.to_string(), params));

        let mut conflicts = self.conflicts.lock().unwrap();
        if *conflicts > 0 {
            *conflicts -= 1;
            return Err(GraphError::AlreadyExists {
                identity: String::new(),
            });
        }
        Ok(())
    }

    async fn fetch_rows(
        &self,
        statement: &str,
        params: Params,
        columns: &[&str],
    ) -> Result<Vec<ResultRow>> {
        self.executed
            .lock()
            .unwrap()
            .push((statement.to_string(), params));
        let rows = self
            .fetch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| ResultRow {
                columns: row
                    .columns
                    .into_iter()
                    .filter(|(name, _)| columns.contains(&name.as_str()))
                    .collect(),
            })
            .collect())
    }
}
