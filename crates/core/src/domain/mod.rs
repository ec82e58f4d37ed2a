pub mod label;
pub mod project;
pub mod task;
