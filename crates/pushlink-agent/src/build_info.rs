//! Build information

pub const BUILD_INFO_CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_INFO_CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Set PUSHLINK_BUILD_COMMIT when building release binaries.
pub const BUILD_INFO_COMMIT: &str = match option_env!("PUSHLINK_BUILD_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

pub fn build_info() -> String {
    format!(
        "{} {}\nCommit: {}",
        BUILD_INFO_CARGO_PKG_NAME, BUILD_INFO_CARGO_PKG_VERSION, BUILD_INFO_COMMIT,
    )
}
