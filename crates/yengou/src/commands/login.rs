//! `login`: exchange a username and password for a bearer token.

use secrecy::{ExposeSecret, SecretString};
use yengou_api::{LoginRole, RestClient, TransportConfig};

use crate::cli::{GlobalOpts, LoginArgs, RoleArg};
use crate::config::Resolved;
use crate::error::CliError;

fn login_role(arg: RoleArg) -> LoginRole {
    match arg {
        RoleArg::Admin => LoginRole::Admin,
        RoleArg::Support => LoginRole::Support,
        RoleArg::User => LoginRole::User,
    }
}

pub async fn handle(
    resolved: &Resolved,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let password = rpassword::prompt_password("Password: ").map_err(|e| CliError::Validation {
        field: "password".into(),
        reason: format!("prompt failed: {e}"),
    })?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    let password = SecretString::from(password);

    let role = args.role.map_or_else(|| resolved.role.login_role(), login_role);
    let client = RestClient::new(
        resolved.console.api_url.clone(),
        &TransportConfig::with_timeout(resolved.console.timeout),
    )?;

    let response = client
        .login(&args.username, &password, role)
        .await
        .map_err(|e| match e {
            yengou_api::Error::Authentication { message } => CliError::AuthFailed {
                profile: resolved.profile_name.clone(),
                message,
            },
            other => other.into(),
        })?;

    let who = response
        .user
        .as_ref()
        .and_then(|u| u.display_name().or_else(|| u.email.clone()))
        .unwrap_or_else(|| args.username.clone());

    if args.print_token {
        println!("{}", response.access_token.expose_secret());
    } else {
        yengou_config::store_token(&resolved.profile_name, &response.access_token)?;
        if !global.quiet {
            eprintln!(
                "Logged in as {who} ({role}); token stored for profile '{}'",
                resolved.profile_name
            );
        }
    }
    Ok(())
}
