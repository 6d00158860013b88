pub mod activity;
pub mod analytics;
pub mod classroom;
pub mod content;
pub mod intervention;
pub mod management;
pub mod practice;
pub mod user;
