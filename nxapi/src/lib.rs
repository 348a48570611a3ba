//! # NX-API client
//!
//! Minimal client for the JSON flavour of the Nexus management API (`/ins`).
//!
//! - **`envelope`**: the `ins_api` request and response envelopes
//! - **`client`**: issues authenticated `cli_show` requests and matches outputs to commands
//! - **`table`**: folds the vendor `TABLE_*`/`ROW_*` structures into rows keyed by interface
//!
//! Everything untyped about the device's answer stays inside this crate: callers get
//! [`Output`]s and rows of typed [`Field`]s.

#[macro_use]
extern crate tracing;

mod client;
mod envelope;
mod error;
mod table;

pub use client::{
    NxApiClient,
    Target,
};
pub use envelope::{
    InsApiRequest,
    InsApiResponse,
    OneOrMany,
    Output,
};
pub use error::NxApiError;
pub use table::{
    rows,
    Field,
    Row,
    Rows,
    DEVICE_ROW,
};
