//! Table model the dashboard draws from, and the narrow interface the refresh
//! machinery drives it through.
//!
//! The model owns rows, per-cell display content, ordering and the custom
//! filter. Structural work (sorting, filtering) only happens in
//! [`TableAdapter::redraw`]; patching a cell never reorders anything, so the
//! selection and scroll position stay put while countdowns tick.

use std::cmp::Ordering;

use crate::campaign::{Campaign, DisplayOptions, SortKey, COLUMNS, COUNTDOWN_COLUMN};
use crate::classify::Status;
use crate::countdown::CountdownDisplay;

/// Predicate deciding whether a row is visible. It sees the live cells, so
/// status checks follow the ticking countdown rather than the fetched value.
pub type RowFilter = Box<dyn Fn(&TableRow) -> bool>;

/// Called once for every row added to the table; may assign a row class.
pub type RowCreatedHook = Box<dyn Fn(usize, &Campaign) -> Option<Status>>;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Stable reference to one cell of one dataset.
///
/// Handles remember the dataset generation they were resolved against, so a
/// handle from a replaced dataset can never patch the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellHandle {
    pub generation: u64,
    pub row: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellContent {
    Text(String),
    Countdown {
        display: CountdownDisplay,
        status: Status,
    },
}

impl CellContent {
    pub fn text(&self) -> String {
        match self {
            CellContent::Text(text) => text.clone(),
            CellContent::Countdown { display, .. } => display.to_string(),
        }
    }
}

/// One row of the table: the record plus its rendered cells.
#[derive(Clone, Debug)]
pub struct TableRow {
    pub data: Campaign,
    pub cells: Vec<CellContent>,
    /// Class assigned by the row-created hooks.
    pub class: Option<Status>,
}

impl TableRow {
    /// Current status: the live countdown status when the row has one,
    /// otherwise the class assigned at creation.
    pub fn status(&self) -> Option<Status> {
        match self.cells.get(COUNTDOWN_COLUMN) {
            Some(CellContent::Countdown { status, .. }) => Some(*status),
            _ => self.class,
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter interface
// ---------------------------------------------------------------------------

/// The only capability the per-second tick gets: write into one cell.
pub trait CellSink {
    /// Replace the content of the cell behind `handle`. Returns `false` when
    /// the handle is stale or out of range.
    fn patch_cell_content(&mut self, handle: CellHandle, content: CellContent) -> bool;
}

/// Everything the refresh controller needs from the table.
pub trait TableAdapter: CellSink {
    /// Initial population.
    fn load(&mut self, rows: Vec<Campaign>);
    /// Drop every row and add `rows`. Any custom filter is reset.
    fn clear_and_replace(&mut self, rows: Vec<Campaign>);
    fn row_count(&self) -> usize;
    fn row_data(&self, index: usize) -> Option<&Campaign>;
    fn get_cell(&self, row: usize, column: usize) -> Option<CellHandle>;
    /// Re-run ordering and filtering.
    fn redraw(&mut self);
    fn register_row_created_hook(&mut self, hook: RowCreatedHook);
    /// Install (or with `None`, remove) the custom filter. Takes effect on the
    /// next redraw.
    fn apply_custom_filter(&mut self, predicate: Option<RowFilter>);
}

// ---------------------------------------------------------------------------
// CampaignTable
// ---------------------------------------------------------------------------

pub struct CampaignTable {
    display: DisplayOptions,
    rows: Vec<TableRow>,
    /// Indices into `rows`, filtered and sorted, as of the last redraw.
    order: Vec<usize>,
    sort_column: usize,
    sort_descending: bool,
    hidden_columns: Vec<usize>,
    filter: Option<RowFilter>,
    hooks: Vec<RowCreatedHook>,
    generation: u64,
    loaded: bool,
    redraws: u64,
}

impl CampaignTable {
    pub fn new(
        display: DisplayOptions,
        sort_column: usize,
        sort_descending: bool,
        hidden_columns: Vec<usize>,
    ) -> Self {
        Self {
            display,
            rows: Vec::new(),
            order: Vec::new(),
            sort_column: sort_column.min(COLUMNS.len() - 1),
            sort_descending,
            hidden_columns,
            filter: None,
            hooks: Vec::new(),
            generation: 0,
            loaded: false,
            redraws: 0,
        }
    }

    /// Whether any dataset has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Row indices in display order as of the last redraw.
    pub fn visible(&self) -> &[usize] {
        &self.order
    }

    pub fn row(&self, index: usize) -> Option<&TableRow> {
        self.rows.get(index)
    }

    /// Indices of the columns that are shown.
    pub fn visible_columns(&self) -> Vec<usize> {
        (0..COLUMNS.len())
            .filter(|i| !self.hidden_columns.contains(i))
            .collect()
    }

    #[cfg(test)]
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.order.clear();
        self.generation += 1;
    }

    fn add(&mut self, rows: Vec<Campaign>) {
        for data in rows {
            let index = self.rows.len();
            let class = self
                .hooks
                .iter()
                .fold(None, |class, hook| hook(index, &data).or(class));

            let cells = COLUMNS
                .iter()
                .enumerate()
                .map(|(column, def)| {
                    if column == COUNTDOWN_COLUMN {
                        CellContent::Countdown {
                            display: CountdownDisplay::of(data.remaining_time_in_seconds),
                            status: class.unwrap_or(Status::Other),
                        }
                    } else {
                        CellContent::Text((def.display)(&data, &self.display))
                    }
                })
                .collect();

            self.rows.push(TableRow { data, cells, class });
        }
    }
}

impl CellSink for CampaignTable {
    fn patch_cell_content(&mut self, handle: CellHandle, content: CellContent) -> bool {
        if handle.generation != self.generation {
            return false;
        }
        match self
            .rows
            .get_mut(handle.row)
            .and_then(|row| row.cells.get_mut(handle.column))
        {
            Some(cell) => {
                *cell = content;
                true
            }
            None => false,
        }
    }
}

impl TableAdapter for CampaignTable {
    fn load(&mut self, rows: Vec<Campaign>) {
        self.clear();
        self.add(rows);
        self.loaded = true;
        self.redraw();
    }

    fn clear_and_replace(&mut self, rows: Vec<Campaign>) {
        self.clear();
        self.filter = None;
        self.add(rows);
        self.loaded = true;
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_data(&self, index: usize) -> Option<&Campaign> {
        self.rows.get(index).map(|row| &row.data)
    }

    fn get_cell(&self, row: usize, column: usize) -> Option<CellHandle> {
        (row < self.rows.len() && column < COLUMNS.len()).then_some(CellHandle {
            generation: self.generation,
            row,
            column,
        })
    }

    fn redraw(&mut self) {
        let sort_key = COLUMNS[self.sort_column].sort_key;

        let mut order: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.filter.as_ref().map_or(true, |f| f(row)))
            .map(|(index, _)| index)
            .collect();

        let keys: Vec<_> = self.rows.iter().map(|row| sort_key(&row.data)).collect();
        // Missing keys stay at the bottom in both directions.
        order.sort_by(|a, b| match (&keys[*a], &keys[*b]) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Greater,
            (_, SortKey::Missing) => Ordering::Less,
            (x, y) if self.sort_descending => y.cmp(x),
            (x, y) => x.cmp(y),
        });

        self.order = order;
        self.redraws += 1;
        tracing::trace!(redraw = self.redraws, visible = self.order.len(), "Redrew table");
    }

    fn register_row_created_hook(&mut self, hook: RowCreatedHook) {
        self.hooks.push(hook);
    }

    fn apply_custom_filter(&mut self, predicate: Option<RowFilter>) {
        self.filter = predicate;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
