//! Kernel identity tokens.
//!
//! Kernels announce themselves with tokens shaped `kernel.<id>.<suffix>`,
//! e.g. `kernel.b1a0e4c3-bb70-49c3-b1f1-b6d79b5f0edf.status`. The middle
//! segment is the routing identity used to address the kernel afterwards.

use crate::error::FormatError;

/// Leading segment every identity token must carry.
pub const TOKEN_PREFIX: &str = "kernel";

/// Extract the `<id>` segment of a `kernel.<id>.<suffix>` token.
pub fn parse_identity_token(token: &str) -> Result<&str, FormatError> {
    let mut segments = token.splitn(3, '.');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(TOKEN_PREFIX), Some(id), Some(_suffix)) if !id.is_empty() => Ok(id),
        _ => Err(FormatError::MalformedIdentityToken(token.to_string())),
    }
}
