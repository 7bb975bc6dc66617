//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] describes the whole HTTP surface: authentication at `/authentication/*`, the REST
//! API at `/api/v1/*` and stored files at `/storage/*`. It is served as JSON and rendered at
//! `/api/docs`.

pub mod api;

pub use api::ApiDoc;
