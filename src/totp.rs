//! TOTP secret provisioning.
//!
//! The console never verifies codes itself; it only produces a shared secret
//! and the otpauth URI an authenticator app scans. Verification happens on
//! the server at login.

use rand::Rng;

pub const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
pub const SECRET_LEN: usize = 16;

/// 16 symbols drawn uniformly from the Base32 alphabet.
pub fn generate_secret<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SECRET_LEN)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_secret(secret: &str) -> bool {
    secret.len() == SECRET_LEN && secret.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        issuer, account, secret, issuer
    )
}

/// URL of the QR image for `uri`, served by an external renderer.
pub fn qr_image_url(service_prefix: &str, uri: &str) -> String {
    format!("{}{}", service_prefix, urlencoding::encode(uri))
}

/// 2FA section of the config form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoFactorSetup {
    pub enabled: bool,
    pub secret: String,
    /// QR image for the current secret; `None` while no secret is shown.
    pub qr_url: Option<String>,
    issuer: String,
    qr_service: String,
}

impl TwoFactorSetup {
    pub fn new(issuer: &str, qr_service: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            qr_service: qr_service.to_string(),
            ..Default::default()
        }
    }

    /// Populate from a loaded config. The QR is only shown for an enabled
    /// setup that already has a secret.
    pub fn load(&mut self, enabled: bool, secret: &str, account: &str) {
        self.enabled = enabled;
        self.secret = secret.to_string();
        self.qr_url = None;
        if enabled && !secret.is_empty() {
            self.refresh_qr(account);
        }
    }

    /// Toggle 2FA. Turning it on without a secret generates one.
    pub fn set_enabled<R: Rng + ?Sized>(&mut self, enabled: bool, account: &str, rng: &mut R) {
        self.enabled = enabled;
        if !enabled {
            return;
        }
        if self.secret.is_empty() {
            self.regenerate(account, rng);
        } else if self.qr_url.is_none() {
            self.refresh_qr(account);
        }
    }

    /// Always replaces the secret.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, account: &str, rng: &mut R) {
        self.secret = generate_secret(rng);
        tracing::info!("generated new two-factor secret");
        self.refresh_qr(account);
    }

    pub fn uri(&self, account: &str) -> String {
        otpauth_uri(&self.issuer, account, &self.secret)
    }

    fn refresh_qr(&mut self, account: &str) {
        self.qr_url = Some(qr_image_url(&self.qr_service, &self.uri(account)));
    }
}
