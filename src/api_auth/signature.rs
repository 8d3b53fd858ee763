//! Request signing and verification.
//!
//! Header format: `EVHUB v1.<principal_hex>.<ts_nonce>.<signature>`
//!
//! The signature is Ed25519 over `principal_hex + ts_nonce + METHOD + path`
//! followed by the raw body bytes, encoded as unpadded base64url.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::error::AuthError;
use crate::core_types::{Identity, Principal};

pub const AUTH_SCHEME: &str = "EVHUB";
pub const AUTH_VERSION: &str = "v1";

/// Parsed Authorization header components.
#[derive(Debug, PartialEq, Eq)]
pub struct AuthHeader<'a> {
    pub principal: Principal,
    pub ts_nonce: i64,
    pub ts_nonce_str: &'a str,
    pub signature: &'a str,
}

/// Bytes covered by the signature.
pub fn signing_payload(
    principal_hex: &str,
    ts_nonce: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Vec<u8> {
    let mut payload =
        Vec::with_capacity(principal_hex.len() + ts_nonce.len() + method.len() + path.len() + body.len());
    payload.extend_from_slice(principal_hex.as_bytes());
    payload.extend_from_slice(ts_nonce.as_bytes());
    payload.extend_from_slice(method.as_bytes());
    payload.extend_from_slice(path.as_bytes());
    payload.extend_from_slice(body);
    payload
}

/// Build the Authorization header value for a request.
pub fn sign_request(identity: &Identity, method: &str, path: &str, body: &[u8]) -> String {
    let principal_hex = identity.principal().to_hex();
    let ts_nonce = identity.next_nonce().to_string();
    let payload = signing_payload(&principal_hex, &ts_nonce, method, path, body);
    let signature = URL_SAFE_NO_PAD.encode(identity.sign(&payload));

    format!(
        "{} {}.{}.{}.{}",
        AUTH_SCHEME, AUTH_VERSION, principal_hex, ts_nonce, signature
    )
}

/// Parse and validate the Authorization header.
pub fn parse_authorization(auth_header: &str) -> Result<AuthHeader<'_>, AuthError> {
    let auth = auth_header
        .strip_prefix(AUTH_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| AuthError::Malformed(format!("expected '{} ' prefix", AUTH_SCHEME)))?;

    // Split into 4 parts: version.principal.ts_nonce.signature
    let parts: Vec<&str> = auth.split('.').collect();
    if parts.len() != 4 {
        return Err(AuthError::Malformed(format!(
            "expected 4 parts, got {}",
            parts.len()
        )));
    }

    let (version, principal, ts_nonce_str, signature) = (parts[0], parts[1], parts[2], parts[3]);

    if version != AUTH_VERSION {
        return Err(AuthError::UnsupportedVersion(version.to_string()));
    }

    let principal = Principal::from_hex(principal)?;

    let ts_nonce = ts_nonce_str
        .parse::<i64>()
        .map_err(|_| AuthError::Malformed("ts_nonce must be a valid integer".into()))?;

    Ok(AuthHeader {
        principal,
        ts_nonce,
        ts_nonce_str,
        signature,
    })
}

/// Verify the Ed25519 signature of a parsed header against the request.
pub fn verify_signature(
    header: &AuthHeader<'_>,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<(), AuthError> {
    let signature_bytes = URL_SAFE_NO_PAD
        .decode(header.signature)
        .map_err(|_| AuthError::BadSignature("invalid base64".into()))?;

    // Ed25519 = 64 bytes
    if signature_bytes.len() != 64 {
        return Err(AuthError::BadSignature(format!(
            "expected 64 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let payload = signing_payload(
        &header.principal.to_hex(),
        header.ts_nonce_str,
        method,
        path,
        body,
    );

    if !header.principal.verify(&payload, &signature_bytes) {
        return Err(AuthError::BadSignature("key does not match".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_auth::AuthErrorCode;

    #[test]
    fn test_sign_then_verify() {
        let id = Identity::generate();
        let header = sign_request(&id, "POST", "/rpc/inc", b"{}");

        let parsed = parse_authorization(&header).unwrap();
        assert_eq!(parsed.principal, id.principal());
        assert!(verify_signature(&parsed, "POST", "/rpc/inc", b"{}").is_ok());
    }

    #[test]
    fn test_tampered_request_rejected() {
        let id = Identity::generate();
        let header = sign_request(&id, "POST", "/rpc/inc", b"{}");
        let parsed = parse_authorization(&header).unwrap();

        for (method, path, body) in [
            ("GET", "/rpc/inc", &b"{}"[..]),
            ("POST", "/rpc/mirror", &b"{}"[..]),
            ("POST", "/rpc/inc", &b"{\"x\":1}"[..]),
        ] {
            let err = verify_signature(&parsed, method, path, body).unwrap_err();
            assert_eq!(err.code(), AuthErrorCode::BadSignature);
        }
    }

    #[test]
    fn test_parse_missing_prefix() {
        let p = Identity::generate().principal();
        let auth = format!("v1.{}.1703260800001.sig", p);
        let err = parse_authorization(&auth).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::MalformedHeader);
    }

    #[test]
    fn test_parse_wrong_version() {
        let p = Identity::generate().principal();
        let auth = format!("EVHUB v2.{}.1703260800001.sig", p);
        let err = parse_authorization(&auth).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::UnsupportedVersion);
    }

    #[test]
    fn test_parse_invalid_principal() {
        let auth = "EVHUB v1.deadbeef.1703260800001.sig";
        let err = parse_authorization(auth).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::InvalidPrincipal);
    }

    #[test]
    fn test_parse_invalid_ts_nonce() {
        let p = Identity::generate().principal();
        let auth = format!("EVHUB v1.{}.not_a_number.sig", p);
        let err = parse_authorization(&auth).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::MalformedHeader);
    }

    #[test]
    fn test_wrong_part_count() {
        let err = parse_authorization("EVHUB v1.a.b").unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::MalformedHeader);
    }

    #[test]
    fn test_signature_of_other_identity_rejected() {
        let alice = Identity::generate();
        let mallory = Identity::generate();
        let header = sign_request(&mallory, "POST", "/rpc/inc", b"");
        // Swap in alice's principal, keep mallory's signature
        let forged = header.replace(&mallory.principal().to_hex(), &alice.principal().to_hex());

        let parsed = parse_authorization(&forged).unwrap();
        let err = verify_signature(&parsed, "POST", "/rpc/inc", b"").unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::BadSignature);
    }
}
