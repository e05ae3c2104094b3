pub mod api;
pub mod errors;
pub mod fixture;
pub mod judges;
pub mod model;

pub use api::DomSnapshotProvider;
pub use errors::PerceiverError;
pub use fixture::StaticSnapshotProvider;
pub use judges::{clickable, enabled, is_form_control, is_interactive, visible};
pub use model::{JudgeReport, PageSnapshot};
