use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zap_watch::{
    client::{get_zap_invoice, CoinosClient, LedgerSource, LightningAddress, RelayPool, RelayTransport},
    config::{Config, WatchMode},
    models::{NostrEvent, ZapDescription},
    nostr::*,
    services::{start_polling, subscribe_to_zap_receipts, PollingConfig, ReceiptWatch, ZapVerifier},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting zap-watch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Watch mode: {:?}", config.watch_mode);
    if !config.ledger_enabled() {
        tracing::warn!("COINOS_API_TOKEN not set, receipts are checked on protocol rules only");
    }

    let keys = Keys::from_nsec(&config.nsec).context("Invalid NOSTR_NSEC")?;
    tracing::info!("Signing as {}", keys.npub()?);

    let relays = Arc::new(RelayPool::new(config.relays.clone()));
    let ledger: Arc<dyn LedgerSource> = Arc::new(CoinosClient::new(config.coinos_api_url.clone())?);

    // Target note
    let target = create_text_event(&keys, &target_event_message(), Vec::new())?;
    relays
        .publish(&target)
        .await
        .context("Failed to publish target note")?;
    tracing::info!("Target note: nostr:{}", encode_nevent(&target, &config.relays)?);

    // Zap invoice
    let address = LightningAddress::parse(&config.lightning_address)?;
    let zap_endpoint = address
        .zap_endpoint()
        .await?
        .with_context(|| format!("{} does not support zaps", config.lightning_address))?;

    let marker = (config.watch_mode == WatchMode::Poll).then(random_marker);
    let zap_request = create_zap_request(
        &keys,
        &target,
        Some(config.zap_amount_msats),
        marker.as_deref(),
        &config.relays,
        None,
    )?;
    let invoice = get_zap_invoice(
        &reqwest::Client::new(),
        zap_endpoint,
        config.zap_amount_msats,
        &zap_request,
    )
    .await?;
    tracing::info!("Zap invoice: {}", invoice);

    let zapper = match (config.watch_mode, marker) {
        (WatchMode::Poll, Some(marker)) => watch_ledger(&config, ledger, marker).await?,
        _ => watch_receipts(&config, relays.clone(), ledger, &target, zap_request).await?,
    };

    let Some(zapper) = zapper else {
        tracing::info!("No zap received");
        return Ok(());
    };

    publish_result(&config, &keys, relays.as_ref(), &target, &zapper).await
}

async fn watch_receipts(
    config: &Config,
    relays: Arc<RelayPool>,
    ledger: Arc<dyn LedgerSource>,
    target: &NostrEvent,
    zap_request: NostrEvent,
) -> Result<Option<String>> {
    let (found_tx, found_rx) = oneshot::channel();
    let verifier = ZapVerifier::new(ledger).with_window(config.verify_window);
    let watch = ReceiptWatch {
        target_event_id: target.id.clone(),
        zap_request,
        strict: config.strict_receipts,
        credential: config.coinos_api_token.clone(),
        timeout: config.watch_timeout,
    };

    let subscription = subscribe_to_zap_receipts(relays, verifier, watch, move |receipt| {
        let _ = found_tx.send(receipt);
    })
    .await?;

    let found = tokio::select! {
        // The sender is dropped without a value when the session times out.
        found = found_rx => found.ok(),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully...");
            subscription.stop();
            None
        }
    };

    // Let the subscription send its CLOSE frames before moving on.
    subscription.closed().await;

    let Some(receipt) = found else {
        return Ok(None);
    };
    match extract_zapper_pubkey(&receipt) {
        Some(pubkey) => Ok(Some(pubkey)),
        None => bail!("Zap receipt {} carries no zapper pubkey", receipt.id),
    }
}

async fn watch_ledger(config: &Config, ledger: Arc<dyn LedgerSource>, marker: String) -> Result<Option<String>> {
    let credential = config
        .coinos_api_token
        .clone()
        .context("COINOS_API_TOKEN required in poll mode")?;
    let polling_config = PollingConfig {
        interval: config.poll_interval,
        timeout: config.watch_timeout,
    };

    let (found_tx, found_rx) = oneshot::channel();
    let polling = start_polling(ledger, credential, marker, polling_config, move |entry| {
        let _ = found_tx.send(entry);
    });

    tokio::select! {
        found = found_rx => {
            let Ok(entry) = found else {
                return Ok(None);
            };
            let pubkey = entry
                .memo
                .as_deref()
                .and_then(|memo| serde_json::from_str::<ZapDescription>(memo).ok())
                .and_then(|request| request.pubkey);
            match pubkey {
                Some(pubkey) => Ok(Some(pubkey)),
                None => bail!("Payment {} memo carries no zapper pubkey", entry.id),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully...");
            polling.stop();
            Ok(None)
        }
    }
}

async fn publish_result(
    config: &Config,
    keys: &Keys,
    relays: &dyn RelayTransport,
    target: &NostrEvent,
    zapper: &str,
) -> Result<()> {
    let fortunes = match &config.fortune_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read FORTUNE_FILE {}", path))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    let lucky_number = generate_lucky_number(config.lucky_min, config.lucky_max);
    let content = result_event_message(
        zapper,
        lucky_number,
        fortune_text(lucky_number, &fortunes),
        &config.result_hashtag,
    )?;
    let tags = vec![
        vec!["p".to_string(), zapper.to_string()],
        vec!["e".to_string(), target.id.clone()],
        vec!["t".to_string(), config.result_hashtag.clone()],
    ];

    let result = create_text_event(keys, &content, tags)?;
    relays
        .publish(&result)
        .await
        .context("Failed to publish result note")?;

    tracing::info!("Lucky number {} sent to {}", lucky_number, zapper);
    Ok(())
}
