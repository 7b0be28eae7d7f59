mod accounts;
mod books;
pub mod db;
mod members;
pub mod models;
mod tables;
mod transactions;

pub use db::{Database, DatabaseError, StoreError, UnitOfWork};
pub use tables::*;
