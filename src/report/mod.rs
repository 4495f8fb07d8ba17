//! Release metadata: version summary, badge block and README rendering.

pub mod generator;
pub mod readme;

pub use generator::{
    build_badge_block, build_release_metadata, build_version_summary, generate_json_report,
    generate_text_summary, ReleaseTextOptions,
};
pub use readme::{render, Markers};
