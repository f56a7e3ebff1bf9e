pub mod batch;
pub mod property;
