//! Login and logout handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pixelbadge_core::Session;
use pixelbadge_core::login::{LoginFlow, LoginState};

const STATE_POLL: Duration = Duration::from_millis(100);

pub async fn login(session: Arc<Session>) -> Result<()> {
    let website = session.config.website_url.clone();
    let flow = LoginFlow::new(session);
    let Some(mut handle) = flow.start() else {
        println!("Already logged in.");
        return Ok(());
    };

    let mut shown_code = None;
    loop {
        tokio::select! {
            joined = &mut handle => {
                joined.context("login task")?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                flow.exit();
                anyhow::bail!("Login cancelled");
            }
            () = tokio::time::sleep(STATE_POLL) => {
                if let LoginState::Polling { code } = flow.state()
                    && shown_code.as_ref() != Some(&code)
                {
                    println!("Enter code {code} at {website} to link this device.");
                    shown_code = Some(code);
                }
            }
        }
    }

    match flow.state() {
        LoginState::Authenticated => {
            println!("Logged in.");
            Ok(())
        }
        LoginState::Expired { code } => anyhow::bail!("Login code {code} expired"),
        LoginState::Error => anyhow::bail!("Could not get a login code from the server"),
        other => anyhow::bail!("Login ended in state {other:?}"),
    }
}

pub async fn logout(session: Arc<Session>) -> Result<()> {
    let flow = LoginFlow::new(session);
    match flow.logout() {
        Some(handle) => {
            // Best effort: the credential is already gone locally.
            handle.await.context("logout task")?;
            println!("Logged out.");
        }
        None => println!("Not logged in."),
    }
    Ok(())
}
