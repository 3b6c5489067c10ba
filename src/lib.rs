//! Olist agent - natural-language analytics over the Olist warehouse

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod llm;
pub mod session;
