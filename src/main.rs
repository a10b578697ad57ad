use std::sync::Arc;

use async_trait::async_trait;
use shc_validator::{
    config::ValidatorConfig,
    directory::{IssuerDirectory, KeyDirectory, SigningKey},
    engine::TrustEngine,
    model::DecodedPayload,
    net::HttpTrustFetcher,
    telemetry,
};

/// The key/issuer directory lives outside this crate; the demo runs
/// against cached and seeded trust material only.
struct OfflineDirectory;

#[async_trait]
impl IssuerDirectory for OfflineDirectory {
    async fn participating_issuers(&self) -> Option<Vec<String>> {
        None
    }
}

#[async_trait]
impl KeyDirectory for OfflineDirectory {
    async fn active_signing_keys(&self, _issuer: &str) -> Option<Vec<SigningKey>> {
        None
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(payload_path) = args.next() else {
        eprintln!("usage: shc-validator <decoded-payload.json> [rid kid]");
        std::process::exit(2);
    };
    let revocation_query = args.next().zip(args.next());

    let config = ValidatorConfig::load()?;
    tracing::info!(mode = ?config.mode, "loaded configuration");

    let payload: DecodedPayload = serde_json::from_str(&std::fs::read_to_string(&payload_path)?)?;

    let fetcher = Arc::new(HttpTrustFetcher::new(&config)?);
    let directory = Arc::new(OfflineDirectory);
    let engine = TrustEngine::new(config, fetcher, directory.clone(), directory).await;

    println!("issuer:   {}", payload.iss);
    println!("holder:   {}", payload.full_name());
    println!("expired:  {}", engine.is_expired(&payload));

    match engine.resolve_rule_set_for(&payload.iss, true) {
        Some(rule_set) => {
            println!("rule set: {} (target {})", rule_set.version, rule_set.rule_target);
            println!("exempt:   {}", engine.is_exempt(&payload, &rule_set));
        }
        None => println!("rule set: none resolved for issuer"),
    }

    if let Some((rid, kid)) = revocation_query {
        let issued_at = payload.issued_at().unwrap_or_else(chrono::Utc::now);
        println!(
            "revoked:  {}",
            engine.is_revoked(&payload.iss, issued_at, &rid, &kid)
        );
    }

    Ok(())
}
