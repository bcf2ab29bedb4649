//! garunner Core - query model, configuration and port definitions
//!
//! This crate contains the pieces every other garunner crate shares:
//! - **Domain types** - `QueryParams`, `ReportQuery`, `Fingerprint`, `Credentials`, `QueryError`
//! - **Port definitions** - Traits for adapters: `IReportingApi`, `IAuthorizer`
//! - **Configuration** - YAML-backed `Config`, the camelCase `Settings` overlay and a builder
//!
//! # Architecture
//!
//! The domain module is pure data and validation with no I/O. Ports define the
//! trait interfaces that the API crate implements (HTTP reporting client,
//! OAuth authorizers) and that tests replace with in-memory doubles.

pub mod config;
pub mod domain;
pub mod ports;
