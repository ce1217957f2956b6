use crate::{
    cli::{
        actions::{Action, check, serve, session},
        globals::GlobalArgs,
    },
    routes::RouteTable,
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn globals(matches: &ArgMatches) -> GlobalArgs {
    GlobalArgs {
        api_url: matches
            .get_one::<String>("api-url")
            .cloned()
            .unwrap_or_else(|| crate::verifier::DEFAULT_API_URL.to_string()),
        api_timeout: matches
            .get_one::<u64>("api-timeout")
            .map(|seconds| Duration::from_secs(*seconds)),
        state_dir: matches
            .get_one::<PathBuf>("state-dir")
            .cloned()
            .unwrap_or_else(GlobalArgs::default_state_dir),
        routes: RouteTable::new(
            strings(matches, "admin-prefix"),
            strings(matches, "protected-prefix"),
            strings(matches, "auth-page"),
        ),
    }
}

/// # Errors
/// Returns an error if the subcommand is unknown or an argument is missing.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    match matches.subcommand() {
        Some(("serve", sub)) => Ok(Action::Serve(serve::Args {
            port: sub.get_one::<u16>("port").copied().unwrap_or(8080),
            site_dir: sub
                .get_one::<PathBuf>("site-dir")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("public")),
            routes: globals.routes,
        })),
        Some(("login", sub)) => Ok(Action::Login(
            globals,
            session::LoginArgs {
                email: required(sub, "email")?,
                password: SecretString::from(required(sub, "password")?),
                redirect: sub.get_one::<String>("redirect").cloned(),
            },
        )),
        Some(("register", sub)) => Ok(Action::Register(
            globals,
            session::RegisterArgs {
                name: required(sub, "name")?,
                email: required(sub, "email")?,
                password: SecretString::from(required(sub, "password")?),
            },
        )),
        Some(("logout", _)) => Ok(Action::Logout(globals)),
        Some(("status", _)) => Ok(Action::Status(globals)),
        Some(("check", sub)) => Ok(Action::Check(
            globals,
            check::Args {
                path: required(sub, "path")?,
            },
        )),
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}
