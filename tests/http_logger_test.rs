//! Tests for http_logger module

use formlift::http_logger::{is_sensitive_header, mask_token, parse_flag, truncate_utf8_safe};

#[test]
fn test_truncate_utf8_safe_ascii() {
    let s = "Hello, World!";
    assert_eq!(truncate_utf8_safe(s, 100), s);
    assert!(truncate_utf8_safe(s, 5).starts_with("Hello"));
}

#[test]
fn test_truncate_utf8_safe_multibyte() {
    let s = "héllo wörld";
    // 'é' spans bytes 1..3, so a cut at 2 must back off to 1
    let truncated = truncate_utf8_safe(s, 2);
    assert!(truncated.starts_with("h..."));
    assert!(truncated.contains("[truncated, total 13 bytes]"));
}

#[test]
fn test_mask_token_with_scheme() {
    assert_eq!(mask_token("Bearer abcdefghijklmnop"), "Bearer abcd...mnop");
    assert_eq!(mask_token("Bearer short"), "Bearer ****");
    assert_eq!(mask_token("Basic dXNlcjpwYXNzd29yZA=="), "Basic dXNl...ZA==");
}

#[test]
fn test_mask_token_generic() {
    assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
    assert_eq!(mask_token("short"), "****");
}

#[test]
fn test_is_sensitive_header() {
    assert!(is_sensitive_header("Authorization"));
    assert!(is_sensitive_header("authorization"));
    assert!(is_sensitive_header("Set-Cookie"));
    assert!(is_sensitive_header("Cookie"));
    assert!(is_sensitive_header("X-Api-Key"));
    assert!(!is_sensitive_header("Content-Type"));
}

#[test]
fn test_parse_flag() {
    for on in ["1", "true", "YES", " on "] {
        assert!(parse_flag(on), "{} should enable logging", on);
    }
    for off in ["0", "false", "", "maybe"] {
        assert!(!parse_flag(off), "{} should not enable logging", off);
    }
}
