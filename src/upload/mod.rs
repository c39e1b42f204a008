//! Upload of stored recipes to an external import API

mod endpoint;
mod pipeline;

pub use endpoint::{import_endpoint, probe_urls, PROBE_PATHS};
pub use pipeline::{probe_api, run_upload, UploadOutcome, UploadPipeline};
