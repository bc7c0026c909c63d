pub mod api;
pub mod booking;
pub mod calendar;
pub mod client_id;
pub mod config;
pub mod fetcher;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod picker;
pub mod schedule;
