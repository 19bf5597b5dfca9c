pub mod certificates;
pub mod config;
pub mod db;
pub mod events;
pub mod notifications;
pub mod pdf;
pub mod qr;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;
