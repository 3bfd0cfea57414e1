//! A client for the [Keen](https://keen.io) access key and cached dataset
//! APIs.
//!
//! Services are built from a [`ProjectSettings`] and an
//! [`HttpClientProvider`](transport::HttpClientProvider). Every call is a
//! single request: credentials and arguments are checked first, then the
//! request is sent, and the response is classified into a typed result or an
//! [`Error`].
//!
//! # Example
//!
//! ```no_run
//! use keen::{Datasets, ProjectSettings, transport::UreqClientProvider};
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = ProjectSettings::from_default_env()?;
//! let datasets = Datasets::new(&settings, &UreqClientProvider::new())?;
//!
//! for definition in datasets.list_all_definitions()? {
//!     println!("{} ({})", definition.dataset_name, definition.display_name);
//! }
//!
//! let results = datasets.get_results("purchases_by_customer", "cust_1", "this_7_days")?;
//! println!("{results:#}");
//! # Ok(())
//! # }
//! ```
//!
//! # Lower-level requests
//!
//! The request types in [`access_key`] and [`dataset`] implement
//! [`ApiRequest`], and can be sent with any [`HttpClient`](transport::HttpClient)
//! using [`ApiRequest::execute`]. Responses can also be read from any
//! [`http::Response`] with [`ApiResponse::from_response`].

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

mod api;
mod config;
mod error;
pub mod transport;

pub use api::*;
pub use api::{access_key::AccessKeys, dataset::Datasets};
pub use config::{DEFAULT_KEEN_URL, Error as ConfigError, KeyKind, ProjectSettings};
pub use error::*;
