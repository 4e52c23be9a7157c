pub mod account_service;
pub mod password;
