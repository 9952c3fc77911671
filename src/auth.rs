use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use crate::engine::Engine;
use crate::error::ApiError;
use crate::model::{Ms, Principal};

/// Claims extracted from a verified token. The token service is authoritative
/// for cryptographic validity and expiry; this core does not re-check either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub principal_id: String,
    pub expires_at: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    Expired,
    InvalidSignature,
    Malformed,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Expired => write!(f, "token has expired"),
            VerifyError::InvalidSignature => write!(f, "token signature is invalid"),
            VerifyError::Malformed => write!(f, "token is malformed"),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Seam to the external token service.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError>;
}

/// Turns a bearer credential into a loaded [`Principal`].
///
/// Every failure mode is a distinct `Unauthenticated` error — missing
/// header, bad scheme, expired token, bad signature, unparseable principal
/// id, unknown principal — and none is ever silently downgraded to another.
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    engine: Arc<Engine>,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>, engine: Arc<Engine>) -> Self {
        Self { verifier, engine }
    }

    pub async fn resolve(&self, credential: Option<&str>) -> Result<Principal, ApiError> {
        let credential =
            credential.ok_or_else(|| ApiError::unauthenticated("credential is missing"))?;

        let mut parts = credential.split_whitespace();
        let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) => (scheme, token),
            _ => return Err(ApiError::unauthenticated("invalid credential format")),
        };
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(ApiError::unauthenticated("unsupported credential scheme"));
        }

        let claims = self
            .verifier
            .verify(token)
            .await
            .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

        let principal_id = Ulid::from_string(&claims.principal_id)
            .map_err(|_| ApiError::unauthenticated("invalid principal id in token"))?;

        self.engine
            .get_principal(&principal_id)
            .ok_or_else(|| ApiError::unauthenticated("principal not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    struct FakeVerifier {
        outcome: Result<TokenClaims, VerifyError>,
    }

    #[async_trait]
    impl TokenVerifier for FakeVerifier {
        async fn verify(&self, _token: &str) -> Result<TokenClaims, VerifyError> {
            self.outcome.clone()
        }
    }

    fn resolver(outcome: Result<TokenClaims, VerifyError>) -> (IdentityResolver, Arc<Engine>) {
        let engine = Arc::new(Engine::new());
        let resolver =
            IdentityResolver::new(Arc::new(FakeVerifier { outcome }), engine.clone());
        (resolver, engine)
    }

    fn claims_for(id: Ulid) -> TokenClaims {
        TokenClaims {
            principal_id: id.to_string(),
            expires_at: i64::MAX,
        }
    }

    #[tokio::test]
    async fn missing_credential() {
        let (r, _) = resolver(Err(VerifyError::Malformed));
        let err = r.resolve(None).await.unwrap_err();
        assert_eq!(err.message, "credential is missing");
    }

    #[tokio::test]
    async fn malformed_scheme_variants() {
        let (r, _) = resolver(Err(VerifyError::Malformed));
        for cred in ["token-without-scheme", "Bearer a b", "Basic abc"] {
            let err = r.resolve(Some(cred)).await.unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::Unauthenticated, "{cred}");
        }
        let err = r.resolve(Some("Basic abc")).await.unwrap_err();
        assert_eq!(err.message, "unsupported credential scheme");
    }

    #[tokio::test]
    async fn scheme_is_case_insensitive() {
        let id = Ulid::new();
        let (r, engine) = resolver(Ok(claims_for(id)));
        engine
            .register_principal(id, "A".into(), "a@x.com".into(), None, Role::Customer)
            .unwrap();
        assert!(r.resolve(Some("bearer sometoken")).await.is_ok());
        assert!(r.resolve(Some("BEARER sometoken")).await.is_ok());
    }

    #[tokio::test]
    async fn expired_and_invalid_are_distinct() {
        let (r, _) = resolver(Err(VerifyError::Expired));
        let err = r.resolve(Some("Bearer t")).await.unwrap_err();
        assert_eq!(err.message, "token has expired");

        let (r, _) = resolver(Err(VerifyError::InvalidSignature));
        let err = r.resolve(Some("Bearer t")).await.unwrap_err();
        assert_eq!(err.message, "token signature is invalid");
    }

    #[tokio::test]
    async fn unparseable_principal_id() {
        let (r, _) = resolver(Ok(TokenClaims {
            principal_id: "not-a-ulid".into(),
            expires_at: i64::MAX,
        }));
        let err = r.resolve(Some("Bearer t")).await.unwrap_err();
        assert_eq!(err.message, "invalid principal id in token");
    }

    #[tokio::test]
    async fn unknown_principal() {
        let (r, _) = resolver(Ok(claims_for(Ulid::new())));
        let err = r.resolve(Some("Bearer t")).await.unwrap_err();
        assert_eq!(err.message, "principal not found");
    }

    #[tokio::test]
    async fn resolves_registered_principal() {
        let id = Ulid::new();
        let (r, engine) = resolver(Ok(claims_for(id)));
        engine
            .register_principal(id, "Ana".into(), "ana@x.com".into(), None, Role::Admin)
            .unwrap();
        let principal = r.resolve(Some("Bearer t")).await.unwrap();
        assert_eq!(principal.id, id);
        assert!(principal.is_admin());
    }
}
