//! `docket client` commands.

use anyhow::{bail, Context, Result};
use regex::Regex;
use uuid::Uuid;

use docket_core::models::{Client, NewClient};

use crate::config::Config;
use crate::engine;

/// Accepted email shape, shared with the HTTP API.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

pub fn email_regex() -> Result<Regex> {
    Regex::new(EMAIL_PATTERN).context("invalid email pattern")
}

pub async fn run_client_create(config: &Config, fields: NewClient) -> Result<()> {
    for (name, value) in [
        ("first name", &fields.first_name),
        ("last name", &fields.last_name),
        ("email", &fields.email),
    ] {
        if value.trim().is_empty() {
            bail!("{} must not be empty", name);
        }
    }
    if !email_regex()?.is_match(&fields.email) {
        bail!("invalid email: {}", fields.email);
    }

    let engine = engine::open(config).await?;
    let client = engine.create_client(&fields).await?;

    println!("created client {}", client.id);
    print_client(&client);
    Ok(())
}

pub async fn run_client_get(config: &Config, id: &str) -> Result<()> {
    let id = Uuid::parse_str(id).with_context(|| format!("invalid client id: {}", id))?;

    let engine = engine::open(config).await?;
    let client = engine.get_client(id).await?;

    print_client(&client);
    Ok(())
}

fn print_client(client: &Client) {
    println!("--- Client ---");
    println!("id:          {}", client.id);
    println!("name:        {} {}", client.first_name, client.last_name);
    println!("email:       {}", client.email);
    if let Some(ref description) = client.description {
        println!("description: {}", description);
    }
    println!(
        "created_at:  {}",
        client.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    );
}
