//! Library crate for old-heck-back, exposing modules for binaries and tests.

pub mod config;
pub mod dao;
pub mod domain;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
