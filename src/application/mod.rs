pub mod bridge;
pub mod catalog;
pub mod error;
pub mod fallback;
pub mod history;
pub mod lifecycle;
pub mod repos;
pub mod resolver;
