pub mod catalog;
pub mod health;
pub mod image;
pub mod ranking;
