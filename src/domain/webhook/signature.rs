//! Provider signature verification.
//!
//! Each provider signs deliveries differently. Every scheme sits behind the
//! [`SignatureVerifier`] trait and [`SignatureVerifierRegistry`] picks the
//! right one for a [`Platform`]. All digest comparisons are constant-time.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::platform::Platform;

/// Default maximum age of a timestamped signature (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for signatures dated in the future (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Checks that a raw body was signed with a shared secret.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true only when `header` carries a valid signature of `body`.
    ///
    /// An empty secret or an empty header never verifies.
    fn verify(&self, header: &str, body: &[u8], secret: &str) -> bool;
}

/// HMAC-SHA256 of the raw body, hex encoded (Hotmart, Kirvano).
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacHexVerifier;

impl SignatureVerifier for HmacHexVerifier {
    fn verify(&self, header: &str, body: &[u8], secret: &str) -> bool {
        if secret.is_empty() {
            return false;
        }
        let Some(provided) = decode_hex_signature(header) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        constant_time_compare(&mac.finalize().into_bytes(), &provided)
    }
}

/// Legacy digest of `body ‖ secret`, hex encoded.
///
/// Eduzz uses MD5, Monetizze SHA-256.
pub struct SuffixedDigestVerifier<D> {
    _digest: std::marker::PhantomData<fn() -> D>,
}

impl<D> SuffixedDigestVerifier<D> {
    pub fn new() -> Self {
        Self {
            _digest: std::marker::PhantomData,
        }
    }
}

impl<D> Default for SuffixedDigestVerifier<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> SignatureVerifier for SuffixedDigestVerifier<D>
where
    D: Digest,
{
    fn verify(&self, header: &str, body: &[u8], secret: &str) -> bool {
        if secret.is_empty() {
            return false;
        }
        let Some(provided) = decode_hex_signature(header) else {
            return false;
        };
        let mut hasher = D::new();
        hasher.update(body);
        hasher.update(secret.as_bytes());
        constant_time_compare(&hasher.finalize(), &provided)
    }
}

/// Parsed components of a `t=<unix>,v1=<hex>[,v1=<hex>...]` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedSignatureHeader {
    pub timestamp: i64,
    /// Every `v1` entry; more than one appears while a secret is being rolled.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl TimestampedSignatureHeader {
    /// Parses the header. Unknown fields (`v0`, future schemes) are ignored.
    ///
    /// Returns `None` when the timestamp or every `v1` entry is missing or
    /// unparseable.
    pub fn parse(header: &str) -> Option<Self> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=')?;
            match key {
                "t" => timestamp = Some(value.parse().ok()?),
                "v1" => v1_signatures.push(hex::decode(value).ok()?),
                _ => {}
            }
        }

        if v1_signatures.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: timestamp?,
            v1_signatures,
        })
    }
}

/// Timestamp-bound HMAC-SHA256 over `"{t}.{body}"` (Stripe).
#[derive(Debug, Clone, Copy)]
pub struct TimestampedHmacVerifier {
    tolerance_secs: i64,
}

impl TimestampedHmacVerifier {
    pub fn new(tolerance_secs: i64) -> Self {
        Self { tolerance_secs }
    }

    /// Verifies against an explicit clock reading.
    pub fn verify_at(&self, header: &str, body: &[u8], secret: &str, now_secs: i64) -> bool {
        if secret.is_empty() {
            return false;
        }
        let Some(parsed) = TimestampedSignatureHeader::parse(header) else {
            return false;
        };
        if !self.timestamp_in_range(parsed.timestamp, now_secs) {
            return false;
        }
        let Some(expected) = compute_timestamped_signature(secret, parsed.timestamp, body) else {
            return false;
        };
        // Evaluate every candidate so timing does not reveal which one matched.
        parsed
            .v1_signatures
            .iter()
            .fold(false, |ok, candidate| {
                constant_time_compare(&expected, candidate) | ok
            })
    }

    fn timestamp_in_range(&self, timestamp: i64, now_secs: i64) -> bool {
        let age = now_secs - timestamp;
        age <= self.tolerance_secs && age >= -MAX_CLOCK_SKEW_SECS
    }
}

impl Default for TimestampedHmacVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

impl SignatureVerifier for TimestampedHmacVerifier {
    fn verify(&self, header: &str, body: &[u8], secret: &str) -> bool {
        self.verify_at(header, body, secret, chrono::Utc::now().timestamp())
    }
}

/// One verifier per platform.
pub struct SignatureVerifierRegistry {
    hmac_hex: HmacHexVerifier,
    timestamped: TimestampedHmacVerifier,
    md5_suffixed: SuffixedDigestVerifier<Md5>,
    sha256_suffixed: SuffixedDigestVerifier<Sha256>,
}

impl SignatureVerifierRegistry {
    /// Creates a registry whose timestamped scheme accepts signatures up to
    /// `tolerance_secs` old.
    pub fn new(tolerance_secs: i64) -> Self {
        Self {
            hmac_hex: HmacHexVerifier,
            timestamped: TimestampedHmacVerifier::new(tolerance_secs),
            md5_suffixed: SuffixedDigestVerifier::new(),
            sha256_suffixed: SuffixedDigestVerifier::new(),
        }
    }

    pub fn verifier_for(&self, platform: Platform) -> &dyn SignatureVerifier {
        match platform {
            Platform::Hotmart | Platform::Kirvano => &self.hmac_hex,
            Platform::Stripe => &self.timestamped,
            Platform::Eduzz => &self.md5_suffixed,
            Platform::Monetizze => &self.sha256_suffixed,
        }
    }

    pub fn verify(&self, platform: Platform, header: &str, body: &[u8], secret: &str) -> bool {
        if header.trim().is_empty() {
            return false;
        }
        self.verifier_for(platform).verify(header, body, secret)
    }
}

impl Default for SignatureVerifierRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

/// Decodes a hex signature, tolerating whitespace and a `sha256=` prefix.
fn decode_hex_signature(header: &str) -> Option<Vec<u8>> {
    let trimmed = header.trim();
    let hex_part = trimmed.strip_prefix("sha256=").unwrap_or(trimmed);
    if hex_part.is_empty() {
        return None;
    }
    hex::decode(hex_part).ok()
}

fn compute_timestamped_signature(secret: &str, timestamp: i64, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes the header value `platform` would send for `body`.
///
/// `timestamp` is only used by the timestamped scheme. Used to sign
/// replayed deliveries and fixtures.
pub fn signature_header_for(platform: Platform, secret: &str, body: &[u8], timestamp: i64) -> String {
    match platform {
        Platform::Hotmart | Platform::Kirvano => Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map(|mut mac| {
                mac.update(body);
                hex::encode(mac.finalize().into_bytes())
            })
            .unwrap_or_default(),
        Platform::Stripe => compute_timestamped_signature(secret, timestamp, body)
            .map(|sig| format!("t={},v1={}", timestamp, hex::encode(sig)))
            .unwrap_or_default(),
        Platform::Eduzz => {
            let mut hasher = Md5::new();
            hasher.update(body);
            hasher.update(secret.as_bytes());
            hex::encode(hasher.finalize())
        }
        Platform::Monetizze => {
            let mut hasher = Sha256::new();
            hasher.update(body);
            hasher.update(secret.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "whsec_test_secret_12345";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"invoice.paid"}"#;

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    // ══════════════════════════════════════════════════════════════
    // Timestamped header parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_with_single_v1() {
        let header = format!("t=1234567890,v1={}", "a".repeat(64));
        let parsed = TimestampedSignatureHeader::parse(&header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.v1_signatures.len(), 1);
        assert_eq!(parsed.v1_signatures[0].len(), 32);
    }

    #[test]
    fn parse_header_keeps_every_v1_and_ignores_unknown_fields() {
        let header = format!(
            "t=1234567890,v1={},v0={},v1={},scheme=hmac",
            "a".repeat(64),
            "b".repeat(64),
            "c".repeat(64)
        );
        let parsed = TimestampedSignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_without_timestamp_is_rejected() {
        let header = format!("v1={}", "a".repeat(64));
        assert!(TimestampedSignatureHeader::parse(&header).is_none());
    }

    #[test]
    fn parse_header_without_v1_is_rejected() {
        assert!(TimestampedSignatureHeader::parse("t=1234567890").is_none());
    }

    #[test]
    fn parse_header_with_bad_hex_or_no_equals_is_rejected() {
        assert!(TimestampedSignatureHeader::parse("t=1,v1=zz").is_none());
        assert!(TimestampedSignatureHeader::parse("t1234567890").is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Per-platform verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn every_platform_accepts_its_own_signature() {
        let registry = SignatureVerifierRegistry::default();
        for platform in Platform::ALL {
            let header = signature_header_for(platform, SECRET, BODY, now());
            assert!(
                registry.verify(platform, &header, BODY, SECRET),
                "{platform} should verify"
            );
        }
    }

    #[test]
    fn wrong_secret_fails_everywhere() {
        let registry = SignatureVerifierRegistry::default();
        for platform in Platform::ALL {
            let header = signature_header_for(platform, SECRET, BODY, now());
            assert!(!registry.verify(platform, &header, BODY, "other_secret"));
        }
    }

    #[test]
    fn empty_secret_or_header_never_verifies() {
        let registry = SignatureVerifierRegistry::default();
        for platform in Platform::ALL {
            let header = signature_header_for(platform, "", BODY, now());
            assert!(!registry.verify(platform, &header, BODY, ""));
            assert!(!registry.verify(platform, "", BODY, SECRET));
            assert!(!registry.verify(platform, "   ", BODY, SECRET));
        }
    }

    #[test]
    fn schemes_are_not_interchangeable() {
        let registry = SignatureVerifierRegistry::default();
        let eduzz = signature_header_for(Platform::Eduzz, SECRET, BODY, now());
        let monetizze = signature_header_for(Platform::Monetizze, SECRET, BODY, now());
        let hotmart = signature_header_for(Platform::Hotmart, SECRET, BODY, now());

        assert!(!registry.verify(Platform::Monetizze, &eduzz, BODY, SECRET));
        assert!(!registry.verify(Platform::Hotmart, &monetizze, BODY, SECRET));
        assert!(!registry.verify(Platform::Stripe, &hotmart, BODY, SECRET));
    }

    #[test]
    fn hex_signature_accepts_prefix_and_uppercase() {
        let registry = SignatureVerifierRegistry::default();
        let sig = signature_header_for(Platform::Kirvano, SECRET, BODY, 0);

        assert!(registry.verify(Platform::Kirvano, &format!("sha256={sig}"), BODY, SECRET));
        assert!(registry.verify(Platform::Kirvano, &sig.to_uppercase(), BODY, SECRET));
    }

    #[test]
    fn stripe_signature_without_timestamp_is_rejected() {
        let registry = SignatureVerifierRegistry::default();
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now());
        let v1_only = header.split(',').nth(1).unwrap().to_string();

        assert!(!registry.verify(Platform::Stripe, &v1_only, BODY, SECRET));
    }

    #[test]
    fn stripe_accepts_any_matching_v1_during_rotation() {
        let ts = now();
        let good = signature_header_for(Platform::Stripe, SECRET, BODY, ts);
        let stale = format!("t={},v1={}", ts, "0".repeat(64));
        let header = format!("{},{}", stale, good.split(',').nth(1).unwrap());

        assert!(TimestampedHmacVerifier::default().verify(&header, BODY, SECRET));
    }

    // ══════════════════════════════════════════════════════════════
    // Timestamp window
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn stripe_timestamp_at_boundary_succeeds() {
        let verifier = TimestampedHmacVerifier::default();
        let now = 1_700_000_000;
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now - 300);
        assert!(verifier.verify_at(&header, BODY, SECRET, now));
    }

    #[test]
    fn stripe_timestamp_past_boundary_fails() {
        let verifier = TimestampedHmacVerifier::default();
        let now = 1_700_000_000;
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now - 301);
        assert!(!verifier.verify_at(&header, BODY, SECRET, now));
    }

    #[test]
    fn stripe_future_timestamp_within_skew_succeeds() {
        let verifier = TimestampedHmacVerifier::default();
        let now = 1_700_000_000;
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now + 30);
        assert!(verifier.verify_at(&header, BODY, SECRET, now));
    }

    #[test]
    fn stripe_future_timestamp_beyond_skew_fails() {
        let verifier = TimestampedHmacVerifier::default();
        let now = 1_700_000_000;
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now + 61);
        assert!(!verifier.verify_at(&header, BODY, SECRET, now));
    }

    #[test]
    fn configured_tolerance_is_honoured() {
        let verifier = TimestampedHmacVerifier::new(10);
        let now = 1_700_000_000;
        let header = signature_header_for(Platform::Stripe, SECRET, BODY, now - 11);
        assert!(!verifier.verify_at(&header, BODY, SECRET, now));
    }

    // ══════════════════════════════════════════════════════════════
    // Properties
    // ══════════════════════════════════════════════════════════════

    fn platform_strategy() -> impl Strategy<Value = Platform> {
        prop::sample::select(Platform::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn any_single_byte_mutation_breaks_the_signature(
            platform in platform_strategy(),
            secret in "[a-zA-Z0-9_]{1,40}",
            body in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let registry = SignatureVerifierRegistry::default();
            let ts = now();
            let header = signature_header_for(platform, &secret, &body, ts);
            prop_assert!(registry.verify(platform, &header, &body, &secret));

            let mut mutated = body.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= flip;
            prop_assert!(!registry.verify(platform, &header, &mutated, &secret));
        }
    }
}
