//! Domain layer: the account entity, the transfer request value, and the
//! ports the engine consumes.

pub mod account;
pub mod ports;
pub mod transfer;
