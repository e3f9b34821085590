//! # Guild Archiver Library
//!
//! This crate archives Discord guilds into a relational store and exposes
//! the archive to HTTP clients:
//! - Incremental scraper over channels, threads and message history
//! - Background job managers (scrape, attachment download, cross-store
//!   transfer) with cancellation and progress reporting
//! - Dual-datasource registry (SQLite file / PostgreSQL server) with
//!   runtime switching and batch migration
//! - Guild freshness analyzer driving selective re-scraping
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities and repository traits
//! - **Application Layer**: Scraper, analyzer, job managers, DTOs
//! - **Infrastructure Layer**: Store, registry and Discord implementations
//! - **Presentation Layer**: HTTP routes and handlers
//!
//! ## Module Structure
//!
//! ```text
//! guild_archiver/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities and repository traits
//! +-- application/   Scraper, analyzer, job managers and DTOs
//! +-- infrastructure/ Database, registry and Discord implementations
//! +-- presentation/  HTTP routes and handlers
//! +-- shared/        Common utilities (errors, snowflake helpers)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core entities and traits
pub mod domain;

// Application layer - Scraper, analyzer and job managers
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
