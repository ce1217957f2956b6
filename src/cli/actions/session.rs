use crate::{
    cli::globals::GlobalArgs,
    routes::post_login_destination,
    session::{AuthResponse, SessionPhase, SessionState},
};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct LoginArgs {
    pub email: String,
    pub password: SecretString,
    pub redirect: Option<String>,
}

#[derive(Debug)]
pub struct RegisterArgs {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

fn signed_in_message(response: &AuthResponse, redirect: Option<&str>) -> String {
    format!(
        "Signed in as {} ({})\nNext: {}",
        response.user.email,
        response.user.role,
        post_login_destination(response, redirect)
    )
}

fn describe(state: &SessionState) -> String {
    match (state.phase(), state.user()) {
        (SessionPhase::Authenticated, Some(user)) => format!(
            "Signed in as {} <{}>\nid: {}\nrole: {}",
            user.name, user.email, user.id, user.role
        ),
        (SessionPhase::Uninitialized | SessionPhase::Loading, _) => {
            "Session is still loading".to_string()
        }
        _ => "Not signed in".to_string(),
    }
}

/// # Errors
/// Returns the auth API's message when the credentials are rejected.
pub async fn login(globals: &GlobalArgs, args: LoginArgs) -> Result<()> {
    let manager = globals.session_manager()?;
    let response = manager
        .login(&args.email, args.password.expose_secret())
        .await?;
    println!("{}", signed_in_message(&response, args.redirect.as_deref()));
    Ok(())
}

/// # Errors
/// Returns the auth API's message when the account cannot be created.
pub async fn register(globals: &GlobalArgs, args: RegisterArgs) -> Result<()> {
    let manager = globals.session_manager()?;
    let response = manager
        .register(&args.name, &args.email, args.password.expose_secret())
        .await?;
    println!("{}", signed_in_message(&response, None));
    Ok(())
}

/// # Errors
/// Returns an error only if the API URL is invalid.
pub fn logout(globals: &GlobalArgs) -> Result<()> {
    globals.session_manager()?.logout();
    println!("Signed out");
    Ok(())
}

/// # Errors
/// Returns an error only if the API URL is invalid.
pub async fn status(globals: &GlobalArgs) -> Result<()> {
    let manager = globals.session_manager()?;
    manager.hydrate().await;
    println!("{}", describe(&manager.current()));
    Ok(())
}
