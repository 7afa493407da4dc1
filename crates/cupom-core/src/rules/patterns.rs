//! Regex patterns for locating an access key inside a QR payload.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A bare 44-digit run with a non-digit (or the string edge) on each side
    pub static ref KEY_BARE: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{44})(?:[^0-9]|$)"
    ).unwrap();

    // URL query parameter: ?chave=..., &p=..., ?key=...
    pub static ref KEY_QUERY_PARAM: Regex = Regex::new(
        r"(?i)[?&](?:chave|p|key)=([0-9]{44})"
    ).unwrap();

    // 44 digits followed by a field delimiter or the end of the payload
    pub static ref KEY_DELIMITED: Regex = Regex::new(
        r"([0-9]{44})(?:[|\s,;]|$)"
    ).unwrap();

    // Every maximal ASCII digit run
    pub static ref DIGIT_RUN: Regex = Regex::new(
        r"[0-9]+"
    ).unwrap();
}
