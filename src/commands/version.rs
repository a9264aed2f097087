//! Command: print version information.

/// Version string baked in by the build script.
pub const VERSION: &str = env!("HARDN_VERSION");

/// Print the version, build date and commit to stdout.
pub fn run() {
    println!("hardn {VERSION}");
    println!("build date: {}", env!("HARDN_BUILD_DATE"));
    println!("commit: {}", env!("HARDN_COMMIT"));
}
