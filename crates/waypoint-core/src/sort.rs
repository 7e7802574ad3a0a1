//! Multi-key in-memory ordering of plans.
//!
//! Sort requests arrive as `(field, direction)` pairs. Each field name is
//! resolved through a fixed registry (`PlanField::from_name`); names that are
//! not in the registry are dropped from the chain rather than rejected.
//! Missing values sort last in both directions and strings compare
//! case-insensitively.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One requested sort key, by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortOrder {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }

    /// Parse `field` or `field,asc|desc`. An unrecognised direction is
    /// treated as ascending.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(',') {
            Some((field, dir)) if dir.trim().eq_ignore_ascii_case("desc") => {
                Self::desc(field.trim())
            }
            Some((field, _)) => Self::asc(field.trim()),
            None => Self::asc(raw.trim()),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{},{dir}", self.field)
    }
}

/// Plan fields that may be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanField {
    Id,
    Title,
    StartDate,
    EndDate,
    Budget,
    Currency,
    CreatedAt,
    IsPublic,
}

impl PlanField {
    /// Registry lookup. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "title" => Some(Self::Title),
            "startDate" => Some(Self::StartDate),
            "endDate" => Some(Self::EndDate),
            "budget" => Some(Self::Budget),
            "currency" => Some(Self::Currency),
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            "isPublic" => Some(Self::IsPublic),
            _ => None,
        }
    }

    /// Ascending comparison with missing values last.
    fn compare(self, a: &Plan, b: &Plan) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Title => cmp_ignore_case(&a.title, &b.title),
            Self::StartDate => a.start_date.cmp(&b.start_date),
            Self::EndDate => a.end_date.cmp(&b.end_date),
            Self::Budget => match (a.budget, b.budget) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
            Self::Currency => cmp_ignore_case(&a.currency, &b.currency),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::IsPublic => a.is_public.cmp(&b.is_public),
        }
    }

    /// Whether the field is absent on `plan`.
    fn is_missing(self, plan: &Plan) -> bool {
        match self {
            Self::StartDate => plan.start_date.is_none(),
            Self::EndDate => plan.end_date.is_none(),
            Self::Budget => plan.budget.is_none(),
            Self::Id | Self::Title | Self::Currency | Self::CreatedAt | Self::IsPublic => false,
        }
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Chained comparator built from resolved sort orders.
#[derive(Debug, Clone, Default)]
pub struct PlanComparator {
    keys: Vec<(PlanField, Direction)>,
    dropped: Vec<String>,
}

impl PlanComparator {
    pub fn new(orders: &[SortOrder]) -> Self {
        let mut keys = Vec::with_capacity(orders.len());
        let mut dropped = Vec::new();
        for order in orders {
            match PlanField::from_name(&order.field) {
                Some(field) => keys.push((field, order.direction)),
                None => dropped.push(order.field.clone()),
            }
        }
        Self { keys, dropped }
    }

    /// Field names that were not in the registry.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn is_unsorted(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &Plan, b: &Plan) -> Ordering {
        for &(field, direction) in &self.keys {
            let ord = match (field.is_missing(a), field.is_missing(b)) {
                (true, true) => Ordering::Equal,
                // Missing values stay last whatever the direction.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = field.compare(a, b);
                    match direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort; a no-op when no known field was requested.
    pub fn sort(&self, plans: &mut [Plan]) {
        if self.is_unsorted() {
            return;
        }
        plans.sort_by(|a, b| self.compare(a, b));
    }
}
