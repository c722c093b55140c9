//! Unified error type for the booking engine, cashier ledger and HTTP layer.
//!
//! Variants carry enough context for a client to tell apart "slot taken",
//! "shop closed that day" and "past the cancellation window". [`Error::kind`]
//! folds them into the coarse categories used to pick an HTTP status.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad or missing input; never retried.
    Validation,
    /// The request clashes with current state (double booking, open session...).
    Conflict,
    /// The referenced record does not exist.
    NotFound,
    /// Role or ownership mismatch.
    Authorization,
    /// Backing store or environment failure.
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Cannot book in the past")]
    PastDate { at: DateTime<Utc> },

    #[error("Shop is closed on {date}")]
    ShopClosed { date: NaiveDate },

    #[error("Outside business hours: {time}")]
    OutsideBusinessHours { time: String },

    #[error("Cancellations only allowed with {hours}h advance notice")]
    CancellationWindow { hours: u32 },

    #[error("Time slot already taken for barber {barber_id} at {at}")]
    SlotTaken { barber_id: i64, at: DateTime<Utc> },

    #[error("Cashier is already open")]
    SessionAlreadyOpen,

    #[error("No open cashier session")]
    NoOpenSession,

    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: i64,
        available: i32,
        requested: i32,
    },

    #[error("Order {order_id} is not open (status {status})")]
    OrderNotOpen { order_id: i64, status: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Not authorized: {message}")]
    Forbidden { message: String },
}

impl Error {
    /// Classifies the error for callers that only care about the category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::PastDate { .. }
            | Self::ShopClosed { .. }
            | Self::OutsideBusinessHours { .. }
            | Self::CancellationWindow { .. } => ErrorKind::Validation,
            Self::SlotTaken { .. }
            | Self::SessionAlreadyOpen
            | Self::NoOpenSession
            | Self::InsufficientStock { .. }
            | Self::OrderNotOpen { .. }
            | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Authorization,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::EnvVar(_) => {
                ErrorKind::Storage
            }
        }
    }

    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        Self::Database(value.to_string())
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// True when the database rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}
