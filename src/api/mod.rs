pub mod error;
pub mod explain;
pub mod health;
pub mod openapi;
