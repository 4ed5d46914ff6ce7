//! Data-access core for the flora/fauna catalog.
//!
//! # Overview
//! Adapts the backend's two resource collections (`/plantas`, `/animais`)
//! into one unified, locally cached list of `Species`, and mediates create,
//! update and delete against the backend with server-confirmed local
//! reconciliation.
//!
//! # Design
//! - `CatalogClient` is stateless apart from `base_url` and the `Session`
//!   handle: `build_*` produces an `HttpRequest`, `parse_*` consumes an
//!   `HttpResponse`, and the I/O in between belongs to a `Transport`.
//! - `SpeciesStore` owns the collection and is generic over `Transport`, so
//!   tests drive it with a scripted fake and production uses
//!   `ReqwestTransport`.
//! - Composite ids (`tree_1`, `animal_7`) key the collection; `id` converts
//!   to and from backend ids.
//! - Wire DTOs are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod id;
pub mod image;
pub mod query;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use auth::{AdminGate, GateOutcome};
pub use client::{CatalogClient, Registration};
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use id::Kind;
pub use image::ImageResolver;
pub use query::{CatalogPage, CatalogQuery, KindCounts, SortOrder};
pub use session::Session;
pub use store::{CatalogIssue, CatalogSnapshot, LoadSummary, SpeciesStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    AnimalDetails, AnimalForm, AnimalRecord, AnimalType, ImageUpload, PlantRecord, PlantType,
    Species, SpeciesDetails, TreeDetails, TreeForm,
};
