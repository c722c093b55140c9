//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod barber_stat;
pub mod cashier_session;
pub mod cashier_transaction;
pub mod cut_history;
pub mod order;
pub mod order_item;
pub mod product;
pub mod service;
pub mod shop_setting;

// Re-export specific types to avoid conflicts
pub use appointment::{
    AppointmentStatus, Column as AppointmentColumn, Entity as Appointment,
    Model as AppointmentModel,
};
pub use barber_stat::{Column as BarberStatColumn, Entity as BarberStat, Model as BarberStatModel};
pub use cashier_session::{
    Column as CashierSessionColumn, Entity as CashierSession, Model as CashierSessionModel,
    SessionStatus,
};
pub use cashier_transaction::{
    Column as CashierTransactionColumn, Entity as CashierTransaction,
    Model as CashierTransactionModel, PaymentMethod, TransactionKind,
};
pub use cut_history::{Column as CutHistoryColumn, Entity as CutHistory, Model as CutHistoryModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{
    Column as OrderItemColumn, Entity as OrderItem, ItemKind, Model as OrderItemModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use service::{Column as ServiceColumn, Entity as Service, Model as ServiceModel};
pub use shop_setting::{
    Column as ShopSettingColumn, Entity as ShopSetting, Model as ShopSettingModel,
};
