use crate::verifier::DEFAULT_API_URL;
use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Base URL of the auth API")
                .env("SESSIONGATE_API_URL")
                .default_value(DEFAULT_API_URL)
                .global(true),
        )
        .arg(
            Arg::new("api-timeout")
                .long("api-timeout")
                .help("Seconds to wait for the auth API (default: no limit)")
                .env("SESSIONGATE_API_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
}
