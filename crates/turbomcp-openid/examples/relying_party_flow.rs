//! OpenID Relying Party Flow
//!
//! This example walks through one OpenID login:
//!
//! 1. Derive realm and return URL from the hosting request
//! 2. Discover the provider for the identifier given on the command line
//! 3. Print the redirect URL, requesting e-mail and nickname
//! 4. Validate a returned query string (pass it as the second argument)
//!
//! ```text
//! RUST_LOG=turbomcp_openid=debug cargo run --example relying_party_flow -- \
//!     https://steamcommunity.com/openid
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use turbomcp_openid::{
    ExtensionRequest, RelyingParty, RelyingPartyConfig, RequestContext, ResponseBag,
    ValidationOutcome,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let identifier = args
        .next()
        .unwrap_or_else(|| "https://steamcommunity.com/openid".to_string());

    // Step 1: the host tells us which request we are serving
    let context = RequestContext::new("https", "rp.example.com").with_request_uri("/login/return");
    let config = RelyingPartyConfig::from_context(&context);
    println!("=== OpenID Relying Party ===\n");
    println!("Realm:      {}", config.realm);
    println!("Return URL: {}\n", config.return_url);

    // Step 2 and 3: discover and build the redirect
    let mut rp = RelyingParty::from_config(config.clone())?.with_extensions(
        ExtensionRequest::new()
            .require("contact/email")
            .request("namePerson/friendly"),
    );
    rp.set_identity(&identifier)?;
    let redirect = rp.auth_url(false).await?;

    if let Some(endpoint) = rp.endpoint() {
        println!(
            "Provider:   {} (OpenID {})",
            endpoint.url(),
            endpoint.version().as_u8()
        );
    }
    println!("Claimed id: {}", rp.claimed_id().unwrap_or_default());
    println!("\nRedirect the user to:\n  {redirect}\n");

    // Step 4: the provider sent the user back
    let Some(query) = args.next() else {
        println!("Pass the returned query string as a second argument to validate it.");
        return Ok(());
    };

    let mut rp = RelyingParty::from_config(config)?.with_response(ResponseBag::from_query(&query));
    match rp.validate().await? {
        ValidationOutcome::Valid(verified) => {
            println!("Signed in as {}", verified.claimed_id);
            for (name, value) in rp.attributes() {
                println!("  {name}: {:?}", value.values());
            }
        }
        ValidationOutcome::Invalid(reason) => println!("Not signed in: {reason}"),
    }
    Ok(())
}
