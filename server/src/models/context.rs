//! Read-only projections loaded for the scanner screen. The purchase and
//! catalogue workflows own these rows; this service never writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::TicketType;

/// Ticket holder as shown to gate staff.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    /// Venue name.
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Records returned next to a resolved ticket. Any of them may be missing if
/// the referenced row was deleted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketContext {
    pub user: Option<User>,
    pub event: Option<Event>,
    pub ticket_type: Option<TicketType>,
}
