use anyhow::Result;
use colored::Colorize;
use tokenauth::{Principal, TokenAuth};

use super::token_json;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

pub async fn issue(
    auth: &TokenAuth,
    audience_id: &str,
    client: Option<&str>,
    single: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let principal = Principal::new(client.unwrap_or_default(), single.unwrap_or_default());
    let token = auth
        .manager()
        .issue_for_audience_id(principal.clone(), audience_id)
        .await?;
    print_success(&format!("Issued token for {}", principal.to_string().cyan()));
    print_value(&token_json(&token, auth.manager().now()), format);
    Ok(())
}

pub async fn validate(auth: &TokenAuth, value: &str, format: OutputFormat) -> Result<()> {
    let token = auth.manager().validate_token(value).await?;
    print_success("Token is valid");
    print_value(&token_json(&token, auth.manager().now()), format);
    Ok(())
}

pub async fn revoke(auth: &TokenAuth, value: &str) -> Result<()> {
    auth.manager().delete_token(value).await?;
    print_success("Token revoked");
    Ok(())
}

pub async fn extend(
    auth: &TokenAuth,
    value: &str,
    audience_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let audience = auth.audiences().get(audience_id).await?;
    let token = auth.manager().extend_token(value, &audience).await?;
    print_success("Token extended");
    print_value(&token_json(&token, auth.manager().now()), format);
    Ok(())
}
