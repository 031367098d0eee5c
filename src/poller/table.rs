//! Column walks against one host.

use crate::column::ColumnTable;
use crate::host::Host;

use super::traits::{PollError, WalkClient};

/// Raw walk results of one host for one cycle, in walk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnarResult {
    columns: Vec<(String, Vec<String>)>,
}

impl ColumnarResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the values of `alias`.
    pub fn insert(&mut self, alias: impl Into<String>, values: Vec<String>) {
        let alias = alias.into();
        match self.columns.iter_mut().find(|(a, _)| *a == alias) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((alias, values)),
        }
    }

    pub fn column(&self, alias: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, v)| v.as_slice())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(a, _)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Walks the configured columns of a host.
///
/// Unknown aliases are logged and skipped; the remaining columns are still
/// walked. Any walk failure aborts the whole host for this cycle.
#[derive(Debug, Clone, Copy)]
pub struct TablePoller<'a> {
    columns: &'a ColumnTable,
}

impl<'a> TablePoller<'a> {
    pub fn new(columns: &'a ColumnTable) -> Self {
        Self { columns }
    }

    /// Walk every alias of `aliases` on `host`.
    ///
    /// # Errors
    /// Returns the first [`PollError`] hit while opening the session or
    /// walking a column. No partial result is returned.
    pub async fn walk<C>(
        &self,
        client: &C,
        host: &Host,
        aliases: &[String],
    ) -> Result<ColumnarResult, PollError>
    where
        C: WalkClient + ?Sized,
    {
        let mut session = client.open(host).await?;
        let mut result = ColumnarResult::new();

        for alias in aliases {
            let identifier = match self.columns.resolve(alias) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(host = %host.name, error = %e, "Skipping column");
                    continue;
                }
            };

            let values = session.walk(identifier).await?;
            tracing::trace!(host = %host.name, alias = %alias, rows = values.len(), "Column walked");
            result.insert(alias.as_str(), values);
        }

        Ok(result)
    }
}
