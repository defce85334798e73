use crate::types::ClaimsPrincipal;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Claim type every named policy checks.
pub const PERMISSION_CLAIM: &str = "Permission";

/// Outcome of evaluating a policy that did not grant access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("authorization policy '{0}' is not registered")]
    Unknown(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("missing '{claim}' claim with value '{policy}'")]
    Forbidden { policy: String, claim: String },
}

/// Named authorization policies registered at startup.
///
/// Each policy is satisfied when the principal carries a `Permission`
/// claim equal to the policy name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationPolicies {
    names: BTreeSet<String>,
}

impl AuthorizationPolicies {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, policy: &str) -> bool {
        self.names.contains(policy)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Checks `principal` against the named policy.
    pub fn evaluate(
        &self,
        policy: &str,
        principal: Option<&ClaimsPrincipal>,
    ) -> Result<(), PolicyError> {
        if !self.contains(policy) {
            return Err(PolicyError::Unknown(policy.to_string()));
        }

        let claims = principal.ok_or(PolicyError::Unauthenticated)?;
        if claims.has_claim(PERMISSION_CLAIM, policy) {
            Ok(())
        } else {
            Err(PolicyError::Forbidden {
                policy: policy.to_string(),
                claim: PERMISSION_CLAIM.to_string(),
            })
        }
    }
}

/// Builds the `Permission` claim for a token: a string for one permission,
/// an array for several, nothing for none.
pub fn permission_claims<S: AsRef<str>>(permissions: &[S]) -> Map<String, Value> {
    let mut claims = Map::new();
    match permissions {
        [] => {}
        [single] => {
            claims.insert(PERMISSION_CLAIM.into(), Value::from(single.as_ref()));
        }
        many => {
            let values = many.iter().map(|p| Value::from(p.as_ref())).collect();
            claims.insert(PERMISSION_CLAIM.into(), Value::Array(values));
        }
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn principal_with(permission: Value) -> ClaimsPrincipal {
        let mut map = Map::new();
        map.insert("sub".into(), json!("user"));
        map.insert(PERMISSION_CLAIM.into(), permission);
        ClaimsPrincipal::new(map)
    }

    #[test]
    fn test_policy_granted_by_matching_claim() {
        let policies = AuthorizationPolicies::new(["Admin", "Reports"]);
        let principal = principal_with(json!("Admin"));

        assert_eq!(policies.evaluate("Admin", Some(&principal)), Ok(()));
    }

    #[test]
    fn test_policy_granted_by_claim_array() {
        let policies = AuthorizationPolicies::new(["Admin", "Reports"]);
        let principal = principal_with(json!(["Support", "Reports"]));

        assert_eq!(policies.evaluate("Reports", Some(&principal)), Ok(()));
    }

    #[test]
    fn test_policy_denied_without_claim() {
        let policies = AuthorizationPolicies::new(["Admin"]);
        let principal = principal_with(json!("Support"));

        assert!(matches!(
            policies.evaluate("Admin", Some(&principal)),
            Err(PolicyError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_policy_requires_principal() {
        let policies = AuthorizationPolicies::new(["Admin"]);
        assert_eq!(
            policies.evaluate("Admin", None),
            Err(PolicyError::Unauthenticated)
        );
    }

    #[test]
    fn test_unknown_policy_reported_before_authentication() {
        let policies = AuthorizationPolicies::new(["Admin"]);
        assert_eq!(
            policies.evaluate("Billing", None),
            Err(PolicyError::Unknown("Billing".to_string()))
        );
    }

    #[test]
    fn test_names_are_deduplicated_and_sorted() {
        let policies = AuthorizationPolicies::new(["Reports", "Admin", "Reports"]);
        assert_eq!(policies.len(), 2);
        assert_eq!(policies.names().collect::<Vec<_>>(), vec!["Admin", "Reports"]);
    }

    #[test]
    fn test_permission_claims_shapes() {
        assert!(permission_claims::<&str>(&[]).is_empty());
        assert_eq!(
            permission_claims(&["Admin"]).get(PERMISSION_CLAIM),
            Some(&json!("Admin"))
        );
        assert_eq!(
            permission_claims(&["Admin", "Reports"]).get(PERMISSION_CLAIM),
            Some(&json!(["Admin", "Reports"]))
        );
    }
}
