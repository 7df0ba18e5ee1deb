//! Per-row countdown state between two refreshes.
//!
//! The cache is rebuilt from the table after every dataset replacement and
//! then advanced once per tick. Ticking only ever writes the countdown cell of
//! each row through a [`CellSink`]; it cannot reload, sort or filter the table.

use crate::campaign::COUNTDOWN_COLUMN;
use crate::classify::Classifier;
use crate::countdown;
use crate::table::{CellContent, CellHandle, CellSink, TableAdapter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub row_index: usize,
    /// Countdown cell of the row.
    pub cell: CellHandle,
    /// Local countdown value, authoritative until the next refresh.
    pub remaining_seconds: i64,
    /// Snapshot of the row's active flag. Only a refresh can change it.
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct RowCache {
    entries: Vec<CacheEntry>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every entry and snapshot the rows currently in `table`.
    pub fn rebuild<A>(&mut self, table: &A, classifier: &Classifier) -> &[CacheEntry]
    where
        A: TableAdapter + ?Sized,
    {
        self.entries.clear();

        for row_index in 0..table.row_count() {
            let (Some(data), Some(cell)) = (
                table.row_data(row_index),
                table.get_cell(row_index, COUNTDOWN_COLUMN),
            ) else {
                continue;
            };
            self.entries.push(CacheEntry {
                row_index,
                cell,
                remaining_seconds: data.remaining_time_in_seconds,
                active: data.is_active(&classifier.translations),
            });
        }

        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CacheEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance every countdown by one second and patch its cell.
    ///
    /// Returns how many cells were actually patched.
    pub fn tick<S>(&mut self, sink: &mut S, classifier: &Classifier) -> usize
    where
        S: CellSink + ?Sized,
    {
        let mut patched = 0;

        for entry in &mut self.entries {
            let tick = countdown::format(entry.remaining_seconds);
            entry.remaining_seconds = tick.next_seconds;

            let status = classifier.status_of(entry.active, tick.next_seconds);
            let content = CellContent::Countdown {
                display: tick.display,
                status,
            };
            if sink.patch_cell_content(entry.cell, content) {
                patched += 1;
            }
        }

        patched
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
