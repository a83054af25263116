use crate::error::Result;
use crate::models::{NostrEvent, UnsignedEvent, TEXT_NOTE_KIND, ZAP_REQUEST_KIND};
use crate::nostr::Keys;
use chrono::Utc;

pub const DEFAULT_ZAP_AMOUNT_MSATS: u64 = 1000;

pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

pub fn create_text_event(keys: &Keys, content: &str, tags: Vec<Vec<String>>) -> Result<NostrEvent> {
    keys.sign(UnsignedEvent {
        pubkey: keys.public_key_hex(),
        created_at: unix_now(),
        kind: TEXT_NOTE_KIND,
        tags,
        content: content.to_string(),
    })
}

/// Builds a signed NIP-57 zap request for `target`.
pub fn create_zap_request(
    keys: &Keys,
    target: &NostrEvent,
    amount_msats: Option<u64>,
    comment: Option<&str>,
    relays: &[String],
    lnurl: Option<&str>,
) -> Result<NostrEvent> {
    let amount = amount_msats.unwrap_or(DEFAULT_ZAP_AMOUNT_MSATS);

    let mut relay_tag = vec!["relays".to_string()];
    relay_tag.extend(relays.iter().cloned());

    let mut tags = vec![
        vec!["p".to_string(), target.pubkey.clone()],
        vec!["amount".to_string(), amount.to_string()],
        relay_tag,
        vec!["e".to_string(), target.id.clone()],
        vec!["k".to_string(), target.kind.to_string()],
    ];
    if let Some(lnurl) = lnurl {
        tags.push(vec!["lnurl".to_string(), lnurl.to_string()]);
    }

    keys.sign(UnsignedEvent {
        pubkey: keys.public_key_hex(),
        created_at: unix_now(),
        kind: ZAP_REQUEST_KIND,
        tags,
        content: comment.unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relays() -> Vec<String> {
        vec!["wss://relay.damus.io/".to_string(), "wss://nos.lol/".to_string()]
    }

    #[test]
    fn text_event_is_signed_kind_one() {
        let keys = Keys::generate();
        let event = create_text_event(&keys, "gm", vec![vec!["t".into(), "zap".into()]]).unwrap();
        assert_eq!(event.kind, TEXT_NOTE_KIND);
        assert_eq!(event.pubkey, keys.public_key_hex());
        assert_eq!(event.tag_value("t"), Some("zap"));
        event.verify().unwrap();
    }

    #[test]
    fn zap_request_references_target() {
        let author = Keys::generate();
        let zapper = Keys::generate();
        let target = create_text_event(&author, "zap me", Vec::new()).unwrap();

        let request =
            create_zap_request(&zapper, &target, Some(21_000), Some("marker"), &relays(), None).unwrap();

        assert_eq!(request.kind, ZAP_REQUEST_KIND);
        assert_eq!(request.content, "marker");
        assert_eq!(request.tag_value("p"), Some(target.pubkey.as_str()));
        assert_eq!(request.tag_value("e"), Some(target.id.as_str()));
        assert_eq!(request.tag_value("amount"), Some("21000"));
        assert_eq!(request.tag_value("k"), Some("1"));
        assert_eq!(request.find_tag("relays").unwrap().len(), 3);
        assert!(!request.has_tag("lnurl"));
        request.verify().unwrap();
    }

    #[test]
    fn zap_request_defaults_amount_and_comment() {
        let keys = Keys::generate();
        let target = create_text_event(&keys, "note", Vec::new()).unwrap();
        let request =
            create_zap_request(&keys, &target, None, None, &relays(), Some("lnurl1xyz")).unwrap();

        assert_eq!(request.tag_value("amount"), Some("1000"));
        assert_eq!(request.content, "");
        assert_eq!(request.tag_value("lnurl"), Some("lnurl1xyz"));
    }
}
