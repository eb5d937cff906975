// 🪪 Identity - bearer credential -> caller id
//
// With a secret configured the token signature (HS256) and expiry are
// checked. Without one the token is taken as already verified upstream and
// only its claims are read.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{BffError, BffResult};
use crate::repository::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: RecordId,
}

#[derive(Debug, Deserialize)]
struct Claims {
    id: Value,
}

#[derive(Clone)]
pub struct BearerIdentity {
    secret: Option<String>,
}

impl BearerIdentity {
    pub fn new(secret: Option<String>) -> Self {
        BearerIdentity { secret }
    }

    /// Trust tokens as already verified
    pub fn trusted() -> Self {
        BearerIdentity { secret: None }
    }

    pub fn verifies_signature(&self) -> bool {
        self.secret.is_some()
    }

    /// Resolve an `Authorization` header value (or a bare token)
    pub fn resolve(&self, credential: Option<&str>) -> BffResult<Caller> {
        let token = credential
            .map(|raw| raw.trim())
            .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw).trim())
            .filter(|token| !token.is_empty())
            .ok_or(BffError::Unauthorized)?;

        let (key, validation) = match &self.secret {
            Some(secret) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_aud = false;
                (DecodingKey::from_secret(secret.as_bytes()), validation)
            }
            None => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.insecure_disable_signature_validation();
                validation.validate_exp = false;
                validation.validate_aud = false;
                validation.required_spec_claims = HashSet::new();
                (DecodingKey::from_secret(&[]), validation)
            }
        };

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|e| {
                debug!(error = %e, "bearer token rejected");
                BffError::Unauthorized
            })?
            .claims;

        let user_id = RecordId::from_value(&claims.id).ok_or(BffError::Unauthorized)?;
        Ok(Caller { user_id })
    }
}

// ============================================================================
// TESTS
// ============================================================================
