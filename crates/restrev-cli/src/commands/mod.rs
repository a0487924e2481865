pub mod common;
pub mod completions;
pub mod restaurants;
pub mod reviews;
pub mod sync;
