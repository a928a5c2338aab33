//! Vidgate Server - HTTP boundary for Streamtape resolution
//!
//! Players cannot fetch Streamtape pages from the browser, so the resolver
//! runs here and answers with a direct media link or a typed failure.
//!
//! | Route                      | Result                                   |
//! |----------------------------|------------------------------------------|
//! | `GET /resolve-streamtape`  | `200 {url}` or `{error, code}`           |
//! | `GET /resolve`             | alias of the above                       |
//! | `GET /health`              | `{status, version, uptime_secs}`         |

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use server::{build_router, ApiServer, AppState};
