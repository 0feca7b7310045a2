//! Per-object encryption of string and stream payloads.

use crate::encryption::CryptoHandler;
use crate::error::Result;
use std::borrow::Cow;

/// Encrypt `data` for object `obj_num`.
///
/// Identity when there is no handler or nothing to encrypt. The result can
/// be longer than the input (AES prepends an IV and pads), so callers that
/// already know a `/Length` must compare it against the returned size.
pub fn encrypt_content<'a>(
    crypto: Option<&dyn CryptoHandler>,
    obj_num: u32,
    data: &'a [u8],
) -> Result<Cow<'a, [u8]>> {
    match crypto {
        Some(handler) if !data.is_empty() => Ok(Cow::Owned(handler.encrypt(obj_num, data)?)),
        _ => Ok(Cow::Borrowed(data)),
    }
}
