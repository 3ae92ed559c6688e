pub mod auth;
pub mod catalog_service;
pub mod ledger_service;
pub mod seed;
