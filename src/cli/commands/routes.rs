use crate::routes::{DEFAULT_ADMIN_PREFIXES, DEFAULT_AUTH_PAGES, DEFAULT_PROTECTED_PREFIXES};
use clap::{Arg, ArgAction, Command};

fn prefix_arg(id: &'static str, env: &'static str, help: &'static str, defaults: &[&'static str]) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .env(env)
        .action(ArgAction::Append)
        .value_delimiter(',')
        .default_values(defaults.iter().copied())
        .global(true)
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(prefix_arg(
            "admin-prefix",
            "SESSIONGATE_ADMIN_PREFIXES",
            "Path prefix that requires an admin role (repeatable)",
            DEFAULT_ADMIN_PREFIXES,
        ))
        .arg(prefix_arg(
            "protected-prefix",
            "SESSIONGATE_PROTECTED_PREFIXES",
            "Path prefix that requires a signed-in user (repeatable)",
            DEFAULT_PROTECTED_PREFIXES,
        ))
        .arg(prefix_arg(
            "auth-page",
            "SESSIONGATE_AUTH_PAGES",
            "Login or register page path (repeatable)",
            DEFAULT_AUTH_PAGES,
        ))
}
