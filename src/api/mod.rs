pub mod employee;
pub mod ledger;
pub mod transaction;
