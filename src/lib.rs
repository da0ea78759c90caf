//! Course progress rollups, unit authorization and guide extraction for the
//! teaching dashboard, plus the HTTP service that serves them.
//!
//! The core modules ([`registry`], [`resolver`], [`progress`], [`authz`],
//! [`guide`], [`dashboard`]) are pure and synchronous over document
//! snapshots. [`store`], [`db`] and [`routes`] do the fetching.

pub mod authz;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod guide;
pub mod models;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod store;

pub use authz::{is_authorized, ConfigDocuments};
pub use guide::{extract, GuideSegments};
pub use progress::aggregate;
pub use registry::CourseRegistry;
pub use resolver::resolve;
