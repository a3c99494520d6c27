use rand::{Rng, distributions::Alphanumeric};

/// Length of public share tokens.
pub const SHARE_ID_LEN: usize = 12;

/// Random URL-safe token used for public share links.
pub fn share_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_ID_LEN)
        .map(char::from)
        .collect()
}
