//! Stacks Core -- ILS connection facade, driver registry, configuration, and patron storage.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod ils;
pub mod models;
