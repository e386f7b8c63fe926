use anyhow::Result;
use colored::Colorize;
use tokenauth::TokenAuth;
use tokenauth::signing::generate_secret;

use super::audience_json;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

pub async fn create(
    auth: &TokenAuth,
    name: &str,
    period: u64,
    format: OutputFormat,
) -> Result<()> {
    let audience = auth.audiences().create(name, period).await?;
    print_success(&format!(
        "Created audience {} ({})",
        audience.id.cyan(),
        audience.name
    ));
    // The secret is only shown in full here and on rotation.
    print_value(&audience_json(&audience, true), format);
    Ok(())
}

pub async fn show(auth: &TokenAuth, id: &str, reveal_secret: bool, format: OutputFormat) -> Result<()> {
    let audience = auth.audiences().get(id).await?;
    print_value(&audience_json(&audience, reveal_secret), format);
    Ok(())
}

pub async fn update(
    auth: &TokenAuth,
    id: &str,
    name: Option<&str>,
    period: Option<u64>,
    rotate_secret: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut audience = auth.audiences().get(id).await?;
    if let Some(name) = name {
        audience.name = name.to_string();
    }
    if let Some(period) = period {
        audience.token_period = period;
    }
    audience.secret = if rotate_secret {
        generate_secret()
    } else {
        String::new()
    };

    let updated = auth.audiences().update(&audience).await?;
    print_success(&format!("Updated audience {}", updated.id.cyan()));
    print_value(&audience_json(&updated, rotate_secret), format);
    Ok(())
}

pub async fn delete(auth: &TokenAuth, id: &str) -> Result<()> {
    auth.audiences().delete(id).await?;
    print_success(&format!("Deleted audience {}", id.cyan()));
    Ok(())
}
