pub mod employee;
pub mod employee_transaction;
pub mod role;
