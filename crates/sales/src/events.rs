//! Notifications emitted after a sale was written.
//!
//! The aggregate never produces these itself; the application service builds
//! them once the repository confirmed the write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::SaleId;
use salesdesk_events::Event;

/// Aggregate type used when wrapping sale events in an envelope.
pub const AGGREGATE_TYPE: &str = "sales.sale";

/// Event: SaleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCreated {
    pub sale_id: SaleId,
    pub sale_number: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleModified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleModified {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDeleted {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleEvent {
    SaleCreated(SaleCreated),
    SaleModified(SaleModified),
    SaleCancelled(SaleCancelled),
    SaleDeleted(SaleDeleted),
}

impl SaleEvent {
    pub fn sale_id(&self) -> SaleId {
        match self {
            SaleEvent::SaleCreated(e) => e.sale_id,
            SaleEvent::SaleModified(e) => e.sale_id,
            SaleEvent::SaleCancelled(e) => e.sale_id,
            SaleEvent::SaleDeleted(e) => e.sale_id,
        }
    }
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleCreated(_) => "sales.sale.created",
            SaleEvent::SaleModified(_) => "sales.sale.modified",
            SaleEvent::SaleCancelled(_) => "sales.sale.cancelled",
            SaleEvent::SaleDeleted(_) => "sales.sale.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleCreated(e) => e.occurred_at,
            SaleEvent::SaleModified(e) => e.occurred_at,
            SaleEvent::SaleCancelled(e) => e.occurred_at,
            SaleEvent::SaleDeleted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_a_type_tag() {
        let event = SaleEvent::SaleCreated(SaleCreated {
            sale_id: SaleId::new(),
            sale_number: 42,
            occurred_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sale_created");
        assert_eq!(json["sale_number"], 42);

        let back: SaleEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_types_are_namespaced() {
        let sale_id = SaleId::new();
        let now = Utc::now();
        let cancelled = SaleEvent::SaleCancelled(SaleCancelled { sale_id, occurred_at: now });

        assert_eq!(cancelled.event_type(), "sales.sale.cancelled");
        assert_eq!(cancelled.sale_id(), sale_id);
        assert_eq!(cancelled.occurred_at(), now);
    }
}
