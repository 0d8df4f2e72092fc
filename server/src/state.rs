use std::env;

use base64::Engine as _;
use color_eyre::eyre::{eyre, WrapErr as _};
use rand::RngCore as _;

pub use tower_cookies::Key;

/// Connection details for the external identity provider.
#[derive(Clone)]
pub struct HydraConfig {
    /// Issuer base URL without a trailing slash
    pub public_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
}

impl HydraConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let public_url = env::var("HYDRA_PUBLIC_URL")
            .map_err(|_| eyre!("HYDRA_PUBLIC_URL environment variable not set"))?;

        let config = Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            client_id: env::var("OAUTH_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            client_secret: env::var("OAUTH_CLIENT_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
            scope: env::var("OAUTH_SCOPE").unwrap_or_else(|_| "openid offline".to_string()),
        };

        config.verify()?;

        Ok(config)
    }

    /// Catch an issuer URL that would produce nonsense endpoint URLs.
    fn verify(&self) -> color_eyre::Result<()> {
        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            return Err(eyre!(
                "HYDRA_PUBLIC_URL must be an absolute http(s) URL, got {:?}",
                self.public_url
            ));
        }
        Ok(())
    }

    pub fn auth_url(&self) -> String {
        format!("{}/oauth2/auth", self.public_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.public_url)
    }

    pub fn device_auth_url(&self) -> String {
        format!("{}/oauth2/device/auth", self.public_url)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hydra: HydraConfig,
    pub cookie_key: Key,
    pub domain: String,
    pub protocol: String,
    pub client: reqwest::Client,
    pub admin_identities: Vec<String>,
}

impl AppState {
    pub fn new(
        hydra: HydraConfig,
        cookie_key: Key,
        domain: String,
        protocol: String,
        admin_identities: Vec<String>,
    ) -> color_eyre::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(10))
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            hydra,
            cookie_key,
            domain,
            protocol,
            client,
            admin_identities,
        })
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let hydra = HydraConfig::from_env()?;
        let cookie_key = cookie_key_from_env()?;

        Self::new(
            hydra,
            cookie_key,
            std::env::var("DOMAIN")?,
            std::env::var("PROTO").unwrap_or_else(|_| "https".to_string()),
            parse_admin_identities(&env::var("ADMIN_IDENTITIES").unwrap_or_default()),
        )
    }

    /// The configured default OAuth client, when there is one.
    pub fn client_id(&self) -> Option<String> {
        self.hydra.client_id.clone()
    }

    /// Returns the canonical redirect URI for the authorization code flow
    pub fn redirect_uri(&self) -> String {
        format!("{}://{}/oauth/hydra/callback", self.protocol, self.domain)
    }

    pub fn is_admin(&self, identity_id: &str) -> bool {
        self.admin_identities.iter().any(|id| id == identity_id)
    }
}

/// Decode a base64-encoded 64-byte cookie sealing key.
pub fn decode_cookie_key(encoded: &str) -> color_eyre::Result<Key> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .wrap_err("COOKIE_KEY is not valid base64")?;

    if bytes.len() != 64 {
        return Err(eyre!(
            "COOKIE_KEY must decode to 64 bytes, got {}",
            bytes.len()
        ));
    }

    Ok(Key::from(&bytes))
}

/// Load the cookie sealing key from COOKIE_KEY, generating a throwaway
/// key when unset so local runs still work. Sessions do not survive a
/// restart on a generated key.
pub fn cookie_key_from_env() -> color_eyre::Result<Key> {
    match env::var("COOKIE_KEY") {
        Ok(encoded) => decode_cookie_key(&encoded),
        Err(_) => {
            tracing::warn!(
                "COOKIE_KEY not set; generating a key for this process only. \
                 Run generate-key and set COOKIE_KEY to keep sessions across restarts."
            );
            let mut key = [0u8; 64];
            rand::rngs::OsRng.fill_bytes(&mut key);
            Ok(Key::from(&key))
        }
    }
}

fn parse_admin_identities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_url: &str) -> HydraConfig {
        HydraConfig {
            public_url: public_url.to_string(),
            client_id: None,
            client_secret: None,
            scope: "openid offline".to_string(),
        }
    }

    #[test]
    fn endpoint_urls_hang_off_the_issuer() {
        let config = config("http://localhost:4444");
        assert_eq!(config.auth_url(), "http://localhost:4444/oauth2/auth");
        assert_eq!(config.token_url(), "http://localhost:4444/oauth2/token");
        assert_eq!(
            config.device_auth_url(),
            "http://localhost:4444/oauth2/device/auth"
        );
    }

    #[test]
    fn issuer_without_a_scheme_is_rejected() {
        assert!(config("hydra.example.com").verify().is_err());
        assert!(config("https://hydra.example.com").verify().is_ok());
    }

    #[test]
    fn cookie_key_must_be_64_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; 64]);
        assert!(decode_cookie_key(&encoded).is_ok());

        let short = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        assert!(decode_cookie_key(&short).is_err());
        assert!(decode_cookie_key("not base64 at all!").is_err());
    }

    #[test]
    fn admin_identities_parse_from_a_comma_list() {
        assert_eq!(
            parse_admin_identities("alice, bob,,carol "),
            vec!["alice", "bob", "carol"]
        );
        assert!(parse_admin_identities("").is_empty());
    }
}
