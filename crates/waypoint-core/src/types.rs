//! Domain types shared across Waypoint crates.
//!
//! `Plan` is the root aggregate and owns an ordered list of `Item`s. Both
//! are persisted as JSON in the owning shard, so every type here is
//! serializable. Field names follow the camelCase wire shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shard_key::{ShardKey, shard_key_of};
use crate::sort::SortOrder;

/// Currency assigned to plans created without one.
pub const DEFAULT_CURRENCY: &str = "USD";

// ── Plan ───────────────────────────────────────────────────────────

/// A travel plan, placed in the shard named by its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub currency: String,
    pub is_public: bool,
    /// Starts at 0, +1 per successful update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Build a version-0 plan from a create request.
    pub fn create(id: Uuid, new: NewPlan, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            budget: new.budget,
            currency: new
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            is_public: new.is_public,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn shard_key(&self) -> ShardKey {
        shard_key_of(&self.id)
    }

    /// Overwrite the mutable fields. Version bookkeeping is the store's job.
    pub fn apply(&mut self, changes: &PlanChanges) {
        self.title = changes.title.clone();
        self.description = changes.description.clone();
        self.start_date = changes.start_date;
        self.end_date = changes.end_date;
        self.budget = changes.budget;
        if let Some(currency) = &changes.currency {
            self.currency = currency.clone();
        }
        if let Some(is_public) = changes.is_public {
            self.is_public = is_public;
        }
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            id: self.id,
            title: self.title.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            budget: self.budget,
            currency: self.currency.clone(),
            is_public: self.is_public,
            version: self.version,
        }
    }
}

/// Listing projection of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub id: Uuid,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub currency: String,
    pub is_public: bool,
    pub version: u64,
}

/// A plan together with its items in position order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDetail {
    #[serde(flatten)]
    pub plan: Plan,
    pub items: Vec<Item>,
}

/// Payload for creating a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Payload for updating a plan; `version` is the one the caller last read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanChanges {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<f64>,
    /// `None` keeps the stored currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// `None` keeps the stored visibility.
    #[serde(default)]
    pub is_public: Option<bool>,
    pub version: u64,
}

// ── Item ───────────────────────────────────────────────────────────

/// A stop within a plan. Always stored in its parent's shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Dense, 1-based, unique within the parent plan.
    pub position: u32,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
    pub budget: Option<f64>,
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn create(
        id: Uuid,
        plan_id: Uuid,
        position: u32,
        new: NewItem,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            plan_id,
            name: new.name,
            address: new.address,
            latitude: new.latitude,
            longitude: new.longitude,
            position,
            arrival: new.arrival,
            departure: new.departure,
            budget: new.budget,
            notes: new.notes,
            version: 0,
            created_at: now,
        }
    }

    pub fn shard_key(&self) -> ShardKey {
        shard_key_of(&self.id)
    }

    /// Overwrite the mutable fields except `position`, which the store
    /// reassigns so siblings stay contiguous.
    pub fn apply(&mut self, changes: &ItemChanges) {
        self.name = changes.name.clone();
        self.address = changes.address.clone();
        self.latitude = changes.latitude;
        self.longitude = changes.longitude;
        self.arrival = changes.arrival;
        self.departure = changes.departure;
        self.budget = changes.budget;
        self.notes = changes.notes.clone();
    }
}

/// Payload for adding an item to a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payload for updating an item; `position` moves it among its siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemChanges {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    pub version: u64,
}

// ── Paging ─────────────────────────────────────────────────────────

/// Offset/limit window plus requested sort orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    #[serde(default)]
    pub sort: Vec<SortOrder>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, order: SortOrder) -> Self {
        self.sort.push(order);
        self
    }

    /// Rows needed from every shard to fill this window: `offset + limit`.
    pub fn needed(&self) -> Option<usize> {
        self.offset.checked_add(self.limit)
    }
}

/// One page of a globally ordered listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn empty(request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content: Vec::new(),
            offset: request.offset,
            limit: request.limit,
            total_elements,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.limit as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn new_plan_defaults_currency_and_version() {
        let plan = Plan::create(
            Uuid::new_v4(),
            NewPlan {
                title: "Lisbon".to_string(),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(plan.currency, "USD");
        assert_eq!(plan.version, 0);
        assert!(!plan.is_public);
        assert_eq!(plan.created_at, plan.updated_at);
    }

    #[test]
    fn plan_apply_keeps_currency_when_absent() {
        let mut plan = Plan::create(
            Uuid::new_v4(),
            NewPlan {
                title: "Rome".to_string(),
                currency: Some("EUR".to_string()),
                ..Default::default()
            },
            now(),
        );
        plan.apply(&PlanChanges {
            title: "Rome & Naples".to_string(),
            budget: Some(1200.0),
            ..Default::default()
        });
        assert_eq!(plan.title, "Rome & Naples");
        assert_eq!(plan.currency, "EUR");
        assert_eq!(plan.budget, Some(1200.0));
    }

    #[test]
    fn plan_wire_shape_is_camel_case() {
        let plan = Plan::create(
            Uuid::nil(),
            NewPlan {
                title: "Oslo".to_string(),
                is_public: true,
                ..Default::default()
            },
            now(),
        );
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["isPublic"], true);
        assert!(json.get("startDate").is_some());
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page {
            content: vec![],
            offset: 0,
            limit: 10,
            total_elements: 21,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn needed_detects_overflow() {
        assert_eq!(PageRequest::new(2, 2).needed(), Some(4));
        assert_eq!(PageRequest::new(usize::MAX, 1).needed(), None);
    }
}
