pub mod events;
pub mod fortune;
pub mod keys;
pub mod message;
pub mod random;

pub use events::{create_text_event, create_zap_request, unix_now};
pub use fortune::{extract_zapper_pubkey, fortune_text, generate_lucky_number};
pub use keys::{decode_nsec, encode_nevent, encode_npub, Keys};
pub use message::{result_event_message, target_event_message};
pub use random::random_marker;
