use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::models::Claims;

/// Session tokens are valid for one day from issue.
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Issue an HS256 session token carrying the subject email and a snapshot of
/// the user's roles. The snapshot is frozen for the token's lifetime; role
/// changes only take effect on the next login.
pub fn issue(
    email: &str,
    roles: &[String],
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiry = now + Duration::seconds(SESSION_TTL_SECS);

    let claims = Claims {
        sub: email.to_owned(),
        roles: roles.to_vec(),
        iat: now.timestamp() as usize,
        exp: expiry.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate signature and expiry; returns the claims on success. Stateless by
/// design: there is no server-side revocation list.
pub fn verify(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn issued_token_round_trips() {
        let roles = vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()];
        let token = issue("a@x.com", &roles, SECRET).unwrap();

        let claims = verify(&token, SECRET).expect("fresh token must validate");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.roles, roles);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Hand-build claims already two hours past expiry, well beyond the
        // validator's leeway.
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "a@x.com".to_string(),
            roles: vec!["ROLE_USER".to_string()],
            iat: now - 7400,
            exp: now - 7200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify(&token, SECRET).is_none());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = issue("a@x.com", &["ROLE_USER".to_string()], SECRET).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let flipped = if parts[2].starts_with('A') { "B" } else { "A" };
        let forged_sig = format!("{}{}", flipped, &parts[2][1..]);
        parts[2] = &forged_sig;
        let forged = parts.join(".");

        assert!(verify(&forged, SECRET).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue("a@x.com", &["ROLE_USER".to_string()], SECRET).unwrap();
        assert!(verify(&token, "some-other-secret").is_none());
    }
}
