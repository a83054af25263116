use crate::models::NostrEvent;
use rand::Rng;

/// Lucky number in `[min, max]`.
pub fn generate_lucky_number(min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Fortune for a 1-based lucky number, cycling through `texts`.
pub fn fortune_text(lucky_number: u32, texts: &[String]) -> Option<&str> {
    if texts.is_empty() {
        return None;
    }
    let index = (lucky_number.saturating_sub(1) as usize) % texts.len();
    texts.get(index).map(String::as_str)
}

/// Pubkey of whoever signed the zap request embedded in a receipt.
pub fn extract_zapper_pubkey(receipt: &NostrEvent) -> Option<String> {
    let description = match receipt.tag_value("description") {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            tracing::warn!("No description tag found in zap receipt {}", receipt.id);
            return None;
        }
    };

    match serde_json::from_str::<crate::models::ZapDescription>(description) {
        Ok(request) => request.pubkey,
        Err(e) => {
            tracing::error!("Failed to parse zap request from description: {}", e);
            None
        }
    }
}
