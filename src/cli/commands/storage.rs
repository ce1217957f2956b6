use clap::{Arg, Command, value_parser};
use std::path::PathBuf;

pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new("state-dir")
            .long("state-dir")
            .help("Directory holding the stored session and cookies")
            .long_help(
                "Directory holding the stored session (storage.json) and cookies (cookies.json). Defaults to the platform data directory.",
            )
            .env("SESSIONGATE_STATE_DIR")
            .value_parser(value_parser!(PathBuf))
            .global(true),
    )
}
