//! Request signing for the TrackSolid open API.

use md5::{Digest, Md5};
use std::collections::BTreeMap;

/// `MD5(secret + k1 v1 k2 v2 ... + secret)` over the parameters sorted by key,
/// as upper-case hex.
pub fn sign(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret.as_bytes());
    for (key, value) in params {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(secret.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Lower-case hex MD5, the form the token endpoint expects for `user_pwd_md5`.
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}
