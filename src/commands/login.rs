//! `login`: exchange credentials for a token and store it

use anyhow::Result;

use crate::auth;
use crate::client::ApiClient;

pub async fn run(client: &ApiClient<'_>, username: Option<String>, password: Option<String>) -> Result<()> {
    auth::login(client.http(), client.settings(), username, password, client.out()).await?;
    Ok(())
}
