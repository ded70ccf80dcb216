pub mod app;
pub mod config;
pub mod doc;
pub mod domain;
pub mod error;
pub mod input;
pub mod links;
pub mod mime;
pub mod output;
pub mod readme;
pub mod relocate;
pub mod rewrite;
pub mod schema;
pub mod store;
pub mod thumbnail;
pub mod tracker;
