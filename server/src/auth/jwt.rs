use anyhow::{bail, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT issuer identifier
const ISSUER: &str = "portal/jwt-tokenizer";

const AUD_ACCESS: &str = "access";
const AUD_REFRESH: &str = "refresh";

/// Claims represents public claim values (as specified in RFC 7519), plus
/// the resolved role codes of the subject. The roles claim is the ground
/// truth the middleware uses for its super-admin check.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    pub aud: String, // Required. "access" or "refresh"
    pub exp: usize,  // Required. Token expiration time (timestamp)
    pub iat: usize,  // Optional. Time at which token was issued (timestamp)
    pub iss: String, // Optional. Token issuer
    pub nbf: usize,  // Optional. Time before which token must not be accepted (timestamp)
    pub sub: String, // Optional. Subject of the token (user identifier)

    #[serde(default)]
    pub roles: Vec<String>,
}

/// A signed token and its expiry timestamp.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expire_after: u64,
}

/// Validated token contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenIdentity {
    pub name: String,
    pub roles: Vec<String>,
}

/// JSON Web Token generator for creating signed tokens.
/// For more details, see: https://en.wikipedia.org/wiki/JSON_Web_Token
pub struct JwtTokenGenerator {
    key: EncodingKey,      // Private key for signing
    access_expiry: usize,  // Access token expiration time in seconds
    refresh_expiry: usize, // Refresh token expiration time in seconds
}

impl JwtTokenGenerator {
    /// Creates a new JWT token generator that signs tokens using an RSA
    /// private key.
    ///
    /// # Arguments
    /// * `private_key` - RSA private key in PEM format
    /// * `access_expiry` - Access token expiration time in seconds
    /// * `refresh_expiry` - Refresh token expiration time in seconds
    pub fn new(private_key: &[u8], access_expiry: u64, refresh_expiry: u64) -> Result<Self> {
        let key = match EncodingKey::from_rsa_pem(private_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA private key for jwt token generation failed: {e}"),
        };
        Ok(Self {
            key,
            access_expiry: access_expiry as usize,
            refresh_expiry: refresh_expiry as usize,
        })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let private_key = include_bytes!("testdata/private_key.pem");
        Self::new(private_key, 60, 3600).unwrap()
    }

    /// Generates an access token carrying the subject and its resolved role
    /// codes.
    pub fn generate_access_token(
        &self,
        name: &str,
        roles: Vec<String>,
        now: u64,
    ) -> Result<IssuedToken> {
        self.generate(name, roles, AUD_ACCESS, self.access_expiry, now)
    }

    /// Generates a refresh token carrying the subject only.
    pub fn generate_refresh_token(&self, name: &str, now: u64) -> Result<IssuedToken> {
        self.generate(name, vec![], AUD_REFRESH, self.refresh_expiry, now)
    }

    fn generate(
        &self,
        name: &str,
        roles: Vec<String>,
        aud: &str,
        expiry: usize,
        now: u64,
    ) -> Result<IssuedToken> {
        let now = now as usize;

        let claims = Claims {
            aud: String::from(aud),
            exp: now + expiry,
            iat: now,
            iss: String::from(ISSUER),
            nbf: now,
            sub: name.to_string(),
            roles,
        };

        // Sign the claims using RS256 algorithm
        match encode(&Header::new(Algorithm::RS256), &claims, &self.key) {
            Ok(token) => Ok(IssuedToken {
                token,
                expire_after: claims.exp as u64,
            }),
            Err(e) => bail!("generate jwt token failed: {e}"),
        }
    }
}

/// JSON Web Token validator for verifying and decoding tokens.
/// Validates token signature, expiration time, and other claims.
pub struct JwtTokenValidator {
    key: DecodingKey, // Public key for verification
}

impl JwtTokenValidator {
    /// Creates a new JWT token validator using an RSA public key.
    ///
    /// # Arguments
    /// * `public_key` - RSA public key in PEM format
    pub fn new(public_key: &[u8]) -> Result<Self> {
        let key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for jwt token validation failed: {e}"),
        };
        Ok(Self { key })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let public_key = include_bytes!("testdata/public_key.pem");
        Self::new(public_key).unwrap()
    }

    /// Validates an access token and returns the identity it carries.
    pub fn validate_access_token(&self, token: &str, now: u64) -> Result<TokenIdentity> {
        self.validate(token, AUD_ACCESS, now)
    }

    /// Validates a refresh token and returns the subject it carries.
    pub fn validate_refresh_token(&self, token: &str, now: u64) -> Result<TokenIdentity> {
        self.validate(token, AUD_REFRESH, now)
    }

    fn validate(&self, token: &str, aud: &str, now: u64) -> Result<TokenIdentity> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]); // Validate issuer
        validation.set_required_spec_claims(&["aud", "exp", "iat", "iss", "nbf", "sub"]);
        validation.set_audience(&[aud]);

        // Verify token signature and decode
        let claims = match decode::<Claims>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => bail!("validate jwt token failed: {e}"),
        };

        // Verify subject is not empty
        if claims.sub.is_empty() {
            bail!("validate jwt token failed: empty subject");
        }

        let now = now as usize;
        if now >= claims.exp {
            bail!("validate jwt token failed: token expired");
        }

        if now < claims.nbf {
            bail!("validate jwt token failed: token not yet valid");
        }

        Ok(TokenIdentity {
            name: claims.sub,
            roles: claims.roles,
        })
    }
}
