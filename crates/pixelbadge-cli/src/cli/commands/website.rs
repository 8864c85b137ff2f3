use anyhow::{Context, Result};
use pixelbadge_core::Session;

pub fn run(session: &Session, no_open: bool) -> Result<()> {
    let url = &session.config.website_url;
    println!("{url}");
    if !no_open {
        open::that(url).with_context(|| format!("open {url}"))?;
    }
    Ok(())
}
