#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_features)]
#![warn(unused_crate_dependencies)]

pub mod args;
pub mod build_info;

use std::process::ExitCode;

use agent::PushRegistrationAgent;
use build_info::{BUILD_INFO_CARGO_PKG_VERSION, BUILD_INFO_COMMIT};
use simple_agent_config::get_config;

fn main() -> ExitCode {
    let args = match args::get_config() {
        Ok(args) => args,
        Err(e) => return e,
    };

    let config = get_config(
        args.agent,
        BUILD_INFO_COMMIT.to_string(),
        BUILD_INFO_CARGO_PKG_VERSION.to_string(),
    )
    .unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async { PushRegistrationAgent::new(config).run().await });

    ExitCode::SUCCESS
}
