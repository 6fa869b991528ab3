pub mod handler;
pub mod ledger;
pub mod models;
mod repository;
pub mod service;
