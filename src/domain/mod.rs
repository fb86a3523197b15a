//! Domain model: loans, their child records, the status machine, and the
//! ports the engine consumes.

pub mod approval;
pub mod command;
pub mod disbursement;
pub mod investment;
pub mod loan;
pub mod money;
pub mod notification;
pub mod ports;
