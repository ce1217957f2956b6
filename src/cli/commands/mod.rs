mod api;
mod logging;
mod routes;
mod storage;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
    value_parser,
};
use std::path::PathBuf;

fn serve() -> Command {
    Command::new("serve")
        .about("Serve the site with the edge route guard in front of every page")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SESSIONGATE_PORT")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("site-dir")
                .long("site-dir")
                .help("Directory with the built site")
                .default_value("public")
                .env("SESSIONGATE_SITE_DIR")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn email_arg() -> Arg {
    Arg::new("email")
        .long("email")
        .help("Account email")
        .env("SESSIONGATE_EMAIL")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new("password")
        .long("password")
        .help("Account password")
        .env("SESSIONGATE_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

fn login() -> Command {
    Command::new("login")
        .about("Sign in and store the session")
        .arg(email_arg())
        .arg(password_arg())
        .arg(
            Arg::new("redirect")
                .long("redirect")
                .help("Page that asked for the login, followed afterwards"),
        )
}

fn register() -> Command {
    Command::new("register")
        .about("Create an account and sign in")
        .arg(
            Arg::new("name")
                .long("name")
                .help("Display name")
                .env("SESSIONGATE_NAME")
                .required(true),
        )
        .arg(email_arg())
        .arg(password_arg())
}

fn check() -> Command {
    Command::new("check")
        .about("Show what the edge guard and the role gate decide for a path")
        .arg(
            Arg::new("path")
                .help("Request path, for example /admin/users")
                .required(true),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("sessiongate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(serve())
        .subcommand(login())
        .subcommand(register())
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("status").about("Verify the stored session and show who is signed in"))
        .subcommand(check());

    let command = api::with_args(command);
    let command = routes::with_args(command);
    let command = storage::with_args(command);
    logging::with_args(command)
}
