use pixelbadge_core::Session;
use pixelbadge_core::store::mask_token;

pub fn run(session: &Session) {
    let credential = session.auth.credential();
    println!("Server:     {}", session.config.base_url);
    println!("Home:       {}", session.home().display());
    if credential.is_logged_in() {
        let token = credential.auth_token.as_deref().unwrap_or_default();
        println!("Logged in:  yes ({})", mask_token(token));
    } else {
        println!("Logged in:  no");
    }
    println!(
        "Badge UUID: {}",
        credential
            .badge_uuid
            .as_deref()
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or("(none)")
    );
    println!("Favorites:  {}", session.favorites.load().list.len());
}
