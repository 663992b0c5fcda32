pub mod bridge;
pub mod input;
pub mod listing;
