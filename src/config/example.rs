//! Bundled example configuration.
use std::path::Path;

use anyhow::Result;

use crate::resources::ResourceChange;
use crate::resources::steward::FileSteward;

/// Annotated example shipped with the binary.
pub const EXAMPLE_CONFIG: &str = include_str!("../../conf/hardn.yml.example");

/// Where the example is installed on first run.
pub const EXAMPLE_PATH: &str = "/etc/hardn/hardn.yml.example";

/// Install the example at [`EXAMPLE_PATH`] unless something is already there.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn install(steward: &FileSteward<'_>) -> Result<ResourceChange> {
    steward.write_if_absent(Path::new(EXAMPLE_PATH), EXAMPLE_CONFIG, 0o644)
}
