pub mod notify;
pub mod payment;
pub mod repository;
pub mod roles;
