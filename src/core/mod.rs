/// Appointment lifecycle: listing, cancellation, completion
pub mod appointment;

/// Slot generation and booking validation
pub mod availability;

/// Cashier sessions, ledger entries and reconciliation
pub mod cashier;

/// Services, products and stock reservation
pub mod catalog;

/// Per-client cut history
pub mod history;

/// Outbound notification seam
pub mod notify;

/// Comandas: lines, totals and settlement
pub mod order;

/// Authenticated caller identity and role checks
pub mod principal;

/// Background appointment reminders
pub mod reminder;

/// Management statistics
pub mod report;

/// Opening hours model and schedule resolution
pub mod schedule;

/// Shop settings singleton
pub mod settings;
