use std::path::PathBuf;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_QR_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/?size=150x150&data=";
pub const DEFAULT_TOTP_ISSUER: &str = "LemwoodMirror";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the mirror service, e.g. `https://mirror.example.com`.
    pub server_url: String,
    /// Durable token storage. Survives restarts like browser local storage.
    pub session_file: PathBuf,
    /// Cookie jar written by the OAuth callback helper. The `admin_token`
    /// cookie in it is consumed once and erased.
    pub cookie_file: Option<PathBuf>,
    /// Prefix the percent-encoded otpauth URI is appended to.
    pub qr_service_url: String,
    pub totp_issuer: String,
    /// Where downloaded files are written.
    pub download_dir: PathBuf,
    /// Connect timeout for the HTTP client, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let state_dir = default_state_dir();
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            session_file: state_dir.join("session"),
            cookie_file: None,
            qr_service_url: DEFAULT_QR_SERVICE.to_string(),
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            download_dir: PathBuf::from("."),
            connect_timeout_secs: 5,
        }
    }
}

fn default_state_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("mirror-admin")
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();
    let server_url = std::env::var("MIRROR_ADMIN_URL").unwrap_or(defaults.server_url);
    url::Url::parse(&server_url)
        .map_err(|e| anyhow::anyhow!("MIRROR_ADMIN_URL is not a valid URL ({}): {}", server_url, e))?;

    Ok(Config {
        server_url,
        session_file: std::env::var("MIRROR_ADMIN_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file),
        cookie_file: std::env::var("MIRROR_ADMIN_COOKIE_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        qr_service_url: std::env::var("MIRROR_ADMIN_QR_SERVICE").unwrap_or(defaults.qr_service_url),
        totp_issuer: std::env::var("MIRROR_ADMIN_TOTP_ISSUER").unwrap_or(defaults.totp_issuer),
        download_dir: std::env::var("MIRROR_ADMIN_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir),
        connect_timeout_secs: std::env::var("MIRROR_ADMIN_CONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.connect_timeout_secs),
    })
}
