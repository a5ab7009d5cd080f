//! HTTP request boundary
//!
//! One endpoint accepts a multipart batch of MIDI files and answers with
//! the packaged mashups. Processing happens on a blocking thread inside a
//! request-scoped temporary workspace.

mod requests_logging;
mod routes;
mod workspace;

pub use routes::{make_app, run_server, AppState};
pub use workspace::RequestWorkspace;
