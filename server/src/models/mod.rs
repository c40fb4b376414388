pub mod alert;
pub mod context;
pub mod scan;
pub mod ticket;

pub use alert::{AlertStatus, NewSecurityAlert, SecurityAlert, Severity};
pub use context::{Event, TicketContext, User};
pub use scan::{GeoPoint, NewScanAttempt, ScanAttempt, ScanResult};
pub use ticket::{ScanStamp, SecurityFields, Ticket, TicketStatus, TicketType, TicketUpdate};
