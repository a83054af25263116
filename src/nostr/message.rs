use crate::error::Result;
use crate::nostr::keys::encode_npub;

pub const DEFAULT_RESULT_HASHTAG: &str = "nostrasia2025";

pub fn target_event_message() -> String {
    "Thank you for praying!\n\
     Please zap this post or the LN QR code.\n\
     \n\
     参拝ありがとうございます！\n\
     この投稿か、LN の QR コードに Zap してください。\n\
     \n\
     ※会場で参拝してない人はこのポストにZapしないでね!"
        .to_string()
}

/// Result note announcing `lucky_number` to the zapper, mentioning them as
/// `nostr:npub…`.
pub fn result_event_message(
    zapper_pubkey: &str,
    lucky_number: u32,
    fortune: Option<&str>,
    hashtag: &str,
) -> Result<String> {
    let mention = format!("nostr:{}", encode_npub(zapper_pubkey)?);

    let mut message = format!(
        "Your omikuji number is \u{201c}{lucky_number}\u{201d}!\n\
         Wishing you a wonderful year ahead.\n\
         \n\
         おみくじの番号は\"{lucky_number}\"です！\n\
         良い一年になりますように。\n"
    );
    if let Some(fortune) = fortune {
        message.push('\n');
        message.push_str(fortune);
        message.push('\n');
    }
    message.push_str(&format!("\n#{} {}", hashtag, mention));

    Ok(message)
}
