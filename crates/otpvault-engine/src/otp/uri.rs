//! Provisioning URI parsing and generation per the Google Authenticator
//! key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://totp/ISSUER:LABEL?secret=BASE32&issuer=ISSUER&algorithm=SHA1&digits=6&period=30`
//!
//! Two Steam spellings are accepted: the `steam://SECRET` shorthand, and
//! an `otpauth://totp/...` URI whose issuer is `Steam`.

use crate::otp::core::{decode_base32_secret, decode_steam_secret};
use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Manual-entry parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fields for creating a TOTP entry by hand instead of from a URI.
/// Unset optionals take the documented defaults.
#[derive(Debug, Clone, Default)]
pub struct TotpParams {
    pub name: String,
    pub secret: String,
    pub issuer: Option<String>,
    pub algorithm: Option<Algorithm>,
    pub digits: Option<u8>,
    pub period: Option<u32>,
    pub note: Option<String>,
}

/// Fields for creating a Steam entry by hand. Digits, period and
/// algorithm are fixed by the Steam format.
#[derive(Debug, Clone, Default)]
pub struct SteamParams {
    pub name: String,
    pub secret: String,
    pub note: Option<String>,
}

/// Build an [`Entry`] from manual TOTP fields.
pub fn entry_from_totp_params(params: &TotpParams) -> Result<Entry, OtpError> {
    let secret = decode_base32_secret(&params.secret)?;
    let mut entry = Entry::totp(
        params.name.clone(),
        secret,
        params.algorithm.unwrap_or_default(),
        params.digits.unwrap_or(DEFAULT_DIGITS),
        params.period.unwrap_or(DEFAULT_PERIOD),
    )?;
    entry.issuer = params.issuer.clone();
    entry.note = params.note.clone();
    Ok(entry)
}

/// Build an [`Entry`] from manual Steam fields.
pub fn entry_from_steam_params(params: &SteamParams) -> Result<Entry, OtpError> {
    let secret = decode_steam_secret(&params.secret)?;
    let mut entry = Entry::steam(params.name.clone(), secret)?;
    entry.note = params.note.clone();
    Ok(entry)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a provisioning URI into an [`Entry`].
///
/// Accepts `otpauth://totp/...`, `otpauth://hotp/...` and the
/// `steam://SECRET` shorthand. The secret is decoded to raw bytes here;
/// downstream code never sees the transport encoding.
pub fn parse_uri(uri: &str) -> Result<Entry, OtpError> {
    if let Some(rest) = uri.strip_prefix("steam://") {
        return parse_steam_shorthand(rest);
    }

    let url = url::Url::parse(uri).map_err(|e| {
        OtpError::new(OtpErrorKind::UnrecognizedUri, format!("invalid URI: {}", e))
    })?;

    if url.scheme() != "otpauth" {
        return Err(OtpError::new(
            OtpErrorKind::UnrecognizedUri,
            format!("expected scheme 'otpauth', got '{}'", url.scheme()),
        ));
    }

    // Unknown or missing type information defaults to TOTP.
    let uri_type = match url.host_str() {
        Some("hotp") => EntryType::Hotp,
        Some("steam") => EntryType::Steam,
        _ => EntryType::Totp,
    };

    // Path is "/LABEL" or "/ISSUER:LABEL"
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let path_decoded = url_decode(path);

    let (path_issuer, label) = if let Some(colon_pos) = path_decoded.find(':') {
        let issuer = path_decoded[..colon_pos].trim().to_string();
        let label = path_decoded[colon_pos + 1..].trim().to_string();
        (Some(issuer), label)
    } else {
        (None, path_decoded.to_string())
    };

    // Query parameters
    let mut secret = None;
    let mut param_issuer = None;
    let mut algorithm = Algorithm::default();
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0u64;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(value.to_string()),
            "issuer" => param_issuer = Some(value.to_string()),
            "algorithm" => {
                if let Some(algo) = Algorithm::from_str_loose(&value) {
                    algorithm = algo;
                }
            }
            "digits" => {
                let d = value.parse::<u8>().map_err(|_| {
                    OtpError::new(
                        OtpErrorKind::UnsupportedDigits,
                        format!("digits is not a number: '{}'", value),
                    )
                })?;
                digits = d;
            }
            "period" => {
                if let Ok(p) = value.parse::<u32>() {
                    period = p;
                }
            }
            "counter" => {
                if let Ok(c) = value.parse::<u64>() {
                    counter = c;
                }
            }
            _ => {} // ignore unknown params
        }
    }

    let secret = secret.ok_or_else(|| {
        OtpError::new(OtpErrorKind::UnrecognizedUri, "missing 'secret' parameter")
    })?;

    // Prefer issuer from query param, then from path prefix.
    let issuer = param_issuer.or(path_issuer);

    // An otpauth://totp URI whose issuer is Steam is a Steam entry.
    let is_steam = uri_type == EntryType::Steam
        || issuer
            .as_deref()
            .map(|i| i.eq_ignore_ascii_case("steam"))
            .unwrap_or(false);

    if is_steam {
        let bytes = decode_steam_secret(&secret)?;
        return Entry::steam(label, bytes);
    }

    let bytes = decode_base32_secret(&secret)?;
    let mut entry = match uri_type {
        EntryType::Hotp => Entry::hotp(label, bytes, algorithm, digits, counter)?,
        _ => Entry::totp(label, bytes, algorithm, digits, period)?,
    };
    entry.issuer = issuer;
    Ok(entry)
}

fn parse_steam_shorthand(secret: &str) -> Result<Entry, OtpError> {
    let secret = secret.trim().trim_end_matches('/');
    if secret.is_empty() {
        return Err(OtpError::new(
            OtpErrorKind::UnrecognizedUri,
            "steam:// URI carries no secret",
        ));
    }
    Entry::steam("Steam", decode_steam_secret(secret)?)
}

/// Parse multiple URIs (one per line), skipping blanks and comments.
pub fn parse_uris(text: &str) -> Vec<Result<Entry, OtpError>> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(parse_uri)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate a provisioning URI from an [`Entry`].
///
/// Default-valued parameters are omitted. Steam entries are emitted as
/// `otpauth://totp/...` with `issuer=Steam` so any scanner that only
/// knows the standard scheme can still import them.
pub fn build_uri(entry: &Entry) -> String {
    let uri_type = match entry.entry_type {
        EntryType::Hotp => "hotp",
        EntryType::Totp | EntryType::Steam => "totp",
    };
    let label = url_encode(&entry.name);

    let issuer = match entry.entry_type {
        EntryType::Steam => Some("Steam".to_string()),
        _ => entry.issuer.clone(),
    };

    let path = match &issuer {
        Some(iss) if !iss.is_empty() => format!("{}:{}", url_encode(iss), label),
        _ => label.clone(),
    };

    let mut params = vec![format!("secret={}", entry.secret_base32())];

    if let Some(ref iss) = issuer {
        params.push(format!("issuer={}", url_encode(iss)));
    }

    if entry.entry_type != EntryType::Steam {
        if entry.algorithm != Algorithm::Sha1 {
            params.push(format!("algorithm={}", entry.algorithm.uri_name()));
        }
        if entry.digits != DEFAULT_DIGITS {
            params.push(format!("digits={}", entry.digits));
        }
        if entry.entry_type == EntryType::Totp && entry.period != DEFAULT_PERIOD {
            params.push(format!("period={}", entry.period));
        }
        if entry.entry_type == EntryType::Hotp {
            params.push(format!("counter={}", entry.counter));
        }
    }

    format!("otpauth://{}/{}?{}", uri_type, path, params.join("&"))
}

/// Generate URIs for multiple entries (one per line).
pub fn build_uris(entries: &[Entry]) -> String {
    entries.iter().map(build_uri).collect::<Vec<_>>().join("\n")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  URL encoding helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn url_encode(s: &str) -> String {
    let mut output = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                output.push(byte as char);
            }
            b' ' => output.push_str("%20"),
            b'@' => output.push_str("%40"),
            _ => output.push_str(&format!("%{:02X}", byte)),
        }
    }
    output
}

fn url_decode(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                result.push(byte as char);
            } else {
                result.push('%');
                result.push_str(&hex);
            }
        } else if c == '+' {
            result.push(' ');
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const B32_SECRET: &str = "JBSWY3DPEHPK3PXP"; // "Hello!\xde\xad\xbe\xef"

    // ── Parse basic TOTP URI ─────────────────────────────────────

    #[test]
    fn parse_basic_totp() {
        let uri = format!(
            "otpauth://totp/Example:alice@example.com?secret={}&issuer=Example",
            B32_SECRET
        );
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.name, "alice@example.com");
        assert_eq!(entry.issuer.as_deref(), Some("Example"));
        assert_eq!(entry.secret_base32(), B32_SECRET);
        assert_eq!(entry.algorithm, Algorithm::Sha1);
        assert_eq!(entry.digits, 6);
        assert_eq!(entry.period, 30);
        assert_eq!(entry.entry_type, EntryType::Totp);
    }

    #[test]
    fn parse_totp_all_params() {
        let uri = format!(
            "otpauth://totp/GitHub:user?secret={}&algorithm=SHA256&digits=8&period=60&issuer=GitHub",
            B32_SECRET
        );
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.algorithm, Algorithm::Sha256);
        assert_eq!(entry.digits, 8);
        assert_eq!(entry.period, 60);
        assert_eq!(entry.issuer.as_deref(), Some("GitHub"));
    }

    #[test]
    fn parse_hotp_with_counter() {
        let uri = format!("otpauth://hotp/TestLabel?secret={}&counter=42", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.entry_type, EntryType::Hotp);
        assert_eq!(entry.counter, 42);
        assert_eq!(entry.name, "TestLabel");
        assert!(entry.issuer.is_none());
    }

    #[test]
    fn parse_totp_no_issuer() {
        let uri = format!("otpauth://totp/myaccount?secret={}", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.name, "myaccount");
        assert!(entry.issuer.is_none());
    }

    #[test]
    fn parse_totp_issuer_in_path_only() {
        let uri = format!("otpauth://totp/Acme:user@ex.com?secret={}", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.issuer.as_deref(), Some("Acme"));
        assert_eq!(entry.name, "user@ex.com");
    }

    #[test]
    fn parse_totp_encoded_chars() {
        let uri = format!(
            "otpauth://totp/My%20Corp:my%20user?secret={}&issuer=My%20Corp",
            B32_SECRET
        );
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.issuer.as_deref(), Some("My Corp"));
        assert_eq!(entry.name, "my user");
    }

    #[test]
    fn parse_secret_decoded_to_bytes() {
        let uri = format!("otpauth://totp/a?secret={}", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        let expected =
            base32::decode(base32::Alphabet::Rfc4648 { padding: false }, B32_SECRET).unwrap();
        assert_eq!(entry.secret, expected);
    }

    #[test]
    fn parse_unknown_params_ignored() {
        let uri = format!("otpauth://totp/a?secret={}&foo=bar&image=x", B32_SECRET);
        assert!(parse_uri(&uri).is_ok());
    }

    // ── Steam spellings ──────────────────────────────────────────

    #[test]
    fn parse_steam_shorthand_uri() {
        let entry = parse_uri(&format!("steam://{}", B32_SECRET)).unwrap();
        assert_eq!(entry.entry_type, EntryType::Steam);
        assert_eq!(entry.digits, STEAM_DIGITS);
        assert_eq!(entry.issuer.as_deref(), Some("Steam"));
    }

    #[test]
    fn parse_steam_via_issuer_param() {
        let uri = format!("otpauth://totp/Steam:account?secret={}&issuer=Steam", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.entry_type, EntryType::Steam);
        assert_eq!(entry.name, "account");
        assert_eq!(entry.digits, STEAM_DIGITS);
    }

    #[test]
    fn parse_steam_issuer_case_insensitive() {
        let uri = format!("otpauth://totp/acct?secret={}&issuer=steam", B32_SECRET);
        assert_eq!(parse_uri(&uri).unwrap().entry_type, EntryType::Steam);
    }

    #[test]
    fn parse_steam_shorthand_empty_secret() {
        let err = parse_uri("steam://").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnrecognizedUri);
    }

    #[test]
    fn parse_steam_ignores_digits_param() {
        let uri = format!("otpauth://totp/acct?secret={}&issuer=Steam&digits=8", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.digits, STEAM_DIGITS);
    }

    // ── Parse errors ─────────────────────────────────────────────

    #[test]
    fn parse_invalid_scheme() {
        let err = parse_uri("https://example.com").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnrecognizedUri);
    }

    #[test]
    fn parse_missing_secret() {
        let err = parse_uri("otpauth://totp/Test?issuer=X").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnrecognizedUri);
    }

    #[test]
    fn parse_unknown_otp_type_defaults_to_totp() {
        let uri = format!("otpauth://otp/Example:alice?secret={}", B32_SECRET);
        let entry = parse_uri(&uri).unwrap();
        assert_eq!(entry.entry_type, EntryType::Totp);
        assert_eq!(entry.name, "alice");
        assert_eq!(entry.digits, 6);
        assert_eq!(entry.period, 30);
    }

    #[test]
    fn parse_not_a_url() {
        assert!(parse_uri("not a url at all").is_err());
    }

    #[test]
    fn parse_bad_secret_encoding() {
        let err = parse_uri("otpauth://totp/Test?secret=!!!").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidSecret);
    }

    #[test]
    fn parse_bad_digits_value() {
        let uri = format!("otpauth://totp/Test?secret={}&digits=abc", B32_SECRET);
        let err = parse_uri(&uri).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnsupportedDigits);
    }

    #[test]
    fn parse_out_of_range_digits() {
        let uri = format!("otpauth://totp/Test?secret={}&digits=4", B32_SECRET);
        let err = parse_uri(&uri).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::UnsupportedDigits);
    }

    // ── Manual entry ─────────────────────────────────────────────

    #[test]
    fn manual_totp_defaults() {
        let params = TotpParams {
            name: "alice".into(),
            secret: B32_SECRET.into(),
            ..Default::default()
        };
        let entry = entry_from_totp_params(&params).unwrap();
        assert_eq!(entry.algorithm, Algorithm::Sha1);
        assert_eq!(entry.digits, 6);
        assert_eq!(entry.period, 30);
        assert!(entry.issuer.is_none());
    }

    #[test]
    fn manual_totp_explicit_fields() {
        let params = TotpParams {
            name: "alice".into(),
            secret: B32_SECRET.into(),
            issuer: Some("Acme".into()),
            algorithm: Some(Algorithm::Sha512),
            digits: Some(8),
            period: Some(60),
            note: Some("work account".into()),
        };
        let entry = entry_from_totp_params(&params).unwrap();
        assert_eq!(entry.algorithm, Algorithm::Sha512);
        assert_eq!(entry.digits, 8);
        assert_eq!(entry.period, 60);
        assert_eq!(entry.note.as_deref(), Some("work account"));
    }

    #[test]
    fn manual_steam_entry() {
        let params = SteamParams {
            name: "account".into(),
            secret: B32_SECRET.into(),
            note: None,
        };
        let entry = entry_from_steam_params(&params).unwrap();
        assert_eq!(entry.entry_type, EntryType::Steam);
        assert_eq!(entry.digits, STEAM_DIGITS);
    }

    #[test]
    fn manual_totp_bad_secret() {
        let params = TotpParams {
            name: "a".into(),
            secret: "!!!".into(),
            ..Default::default()
        };
        let err = entry_from_totp_params(&params).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidSecret);
    }

    // ── Generate URI ─────────────────────────────────────────────

    #[test]
    fn build_basic_totp_uri() {
        let entry = parse_uri(&format!(
            "otpauth://totp/Example:alice?secret={}&issuer=Example",
            B32_SECRET
        ))
        .unwrap();
        let uri = build_uri(&entry);
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains(&format!("secret={}", B32_SECRET)));
        assert!(uri.contains("issuer=Example"));
    }

    #[test]
    fn build_uri_omits_defaults() {
        let entry = parse_uri(&format!("otpauth://totp/user?secret={}", B32_SECRET)).unwrap();
        let uri = build_uri(&entry);
        // SHA1, 6 digits, 30 s period are defaults and must not appear.
        assert!(!uri.contains("algorithm="));
        assert!(!uri.contains("digits="));
        assert!(!uri.contains("period="));
    }

    #[test]
    fn build_uri_non_default_params() {
        let params = TotpParams {
            name: "user".into(),
            secret: B32_SECRET.into(),
            issuer: Some("Acme".into()),
            algorithm: Some(Algorithm::Sha512),
            digits: Some(8),
            period: Some(60),
            note: None,
        };
        let uri = build_uri(&entry_from_totp_params(&params).unwrap());
        assert!(uri.contains("algorithm=SHA512"));
        assert!(uri.contains("digits=8"));
        assert!(uri.contains("period=60"));
    }

    #[test]
    fn build_hotp_uri() {
        let uri_in = format!("otpauth://hotp/user?secret={}&counter=99", B32_SECRET);
        let uri = build_uri(&parse_uri(&uri_in).unwrap());
        assert!(uri.starts_with("otpauth://hotp/"));
        assert!(uri.contains("counter=99"));
    }

    #[test]
    fn build_steam_uri_roundtrips_as_steam() {
        let entry = parse_uri(&format!("steam://{}", B32_SECRET)).unwrap();
        let uri = build_uri(&entry);
        assert!(uri.contains("issuer=Steam"));
        let reparsed = parse_uri(&uri).unwrap();
        assert_eq!(reparsed.entry_type, EntryType::Steam);
        assert_eq!(reparsed.secret, entry.secret);
    }

    // ── Roundtrip ────────────────────────────────────────────────

    #[test]
    fn parse_build_roundtrip() {
        let original = format!(
            "otpauth://totp/GitHub:user%40mail.com?secret={}&issuer=GitHub&algorithm=SHA256&digits=8&period=60",
            B32_SECRET
        );
        let entry = parse_uri(&original).unwrap();
        let re_parsed = parse_uri(&build_uri(&entry)).unwrap();
        assert_eq!(re_parsed.name, entry.name);
        assert_eq!(re_parsed.issuer, entry.issuer);
        assert_eq!(re_parsed.algorithm, entry.algorithm);
        assert_eq!(re_parsed.digits, entry.digits);
        assert_eq!(re_parsed.period, entry.period);
        assert_eq!(re_parsed.secret, entry.secret);
    }

    // ── Multi-line parse / build ─────────────────────────────────

    #[test]
    fn parse_uris_multi_line() {
        let text = format!(
            "otpauth://totp/A:a?secret={s}\n\
             # comment\n\
             otpauth://totp/B:b?secret={s}\n\
             \n\
             otpauth://hotp/C:c?secret={s}&counter=1\n",
            s = B32_SECRET
        );
        let results = parse_uris(&text);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn parse_uris_keeps_per_line_errors() {
        let text = format!("otpauth://totp/A:a?secret={}\nnot-a-uri\n", B32_SECRET);
        let results = parse_uris(&text);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn build_uris_multiple() {
        let a = parse_uri(&format!("otpauth://totp/a?secret={}", B32_SECRET)).unwrap();
        let b = parse_uri(&format!("otpauth://totp/b?secret={}", B32_SECRET)).unwrap();
        let output = build_uris(&[a, b]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("otpauth://")));
    }

    // ── URL encoding helpers ─────────────────────────────────────

    #[test]
    fn url_encode_basic() {
        assert_eq!(url_encode("hello"), "hello");
        assert_eq!(url_encode("hello world"), "hello%20world");
        assert_eq!(url_encode("a@b"), "a%40b");
    }

    #[test]
    fn url_decode_basic() {
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a%40b"), "a@b");
        assert_eq!(url_decode("no+plus"), "no plus");
    }
}
