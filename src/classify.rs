//! Status buckets and aggregate counts.

use crate::campaign::Campaign;
use crate::config::Translations;

/// Derived status of one campaign row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    /// Inactive and starting within the upcoming threshold.
    Upcoming,
    Other,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Upcoming => "upcoming",
            Status::Other => "scheduled",
        }
    }
}

/// Everything classification depends on besides the row itself.
#[derive(Clone, Debug)]
pub struct Classifier {
    pub upcoming_threshold: i64,
    pub translations: Translations,
}

impl Classifier {
    pub fn new(upcoming_threshold: i64, translations: Translations) -> Self {
        Self {
            upcoming_threshold,
            translations,
        }
    }

    /// Status of `row` using its server-supplied remaining seconds.
    pub fn classify(&self, row: &Campaign) -> Status {
        self.status_of(row.is_active(&self.translations), row.remaining_time_in_seconds)
    }

    /// Status for an explicit active flag and remaining-seconds value. The
    /// threshold is inclusive.
    pub fn status_of(&self, active: bool, remaining_seconds: i64) -> Status {
        if active {
            Status::Active
        } else if remaining_seconds <= self.upcoming_threshold {
            Status::Upcoming
        } else {
            Status::Other
        }
    }

    /// Count rows per bucket.
    pub fn aggregate<'a, I>(&self, rows: I) -> Counts
    where
        I: IntoIterator<Item = &'a Campaign>,
    {
        rows.into_iter()
            .fold(Counts::default(), |mut counts, row| {
                counts.total += 1;
                match self.classify(row) {
                    Status::Active => counts.active += 1,
                    Status::Upcoming => counts.upcoming += 1,
                    Status::Other => {}
                }
                counts
            })
    }
}

/// Aggregate bucket counts over one row set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub upcoming: usize,
    pub active: usize,
}

impl Counts {
    /// Rows that are neither upcoming nor active.
    pub fn other(&self) -> usize {
        self.total - self.upcoming - self.active
    }
}

// ---------------------------------------------------------------------------
// Status filter
// ---------------------------------------------------------------------------

/// User-selectable status filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Upcoming,
}

impl StatusFilter {
    pub fn matches(self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == Status::Active,
            StatusFilter::Upcoming => status == Status::Upcoming,
        }
    }

    /// The next filter in the `All → Active → Upcoming` cycle.
    pub fn cycle(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Upcoming,
            StatusFilter::Upcoming => StatusFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Upcoming => "upcoming",
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "upcoming" => Ok(StatusFilter::Upcoming),
            other => Err(format!(
                "unknown status filter '{}' (expected all, active or upcoming)",
                other
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
