use std::sync::Arc;

use boilerplate_core::{ListResult, now_rfc3339};
use boilerplate_sql::Value;

use crate::model::{CreatePolicyRule, PTYPE_GROUP, PTYPE_POLICY, PolicyRule};
use crate::service::{AuthError, AuthService, matcher::Matcher};

impl AuthService {
    /// Create a policy rule and rebuild the matcher.
    ///
    /// Duplicate tuples collapse onto the same deterministic id and
    /// surface as a conflict.
    pub fn create_policy_rule(&self, input: CreatePolicyRule) -> Result<PolicyRule, AuthError> {
        if input.ptype != PTYPE_POLICY && input.ptype != PTYPE_GROUP {
            return Err(AuthError::Validation(
                "ptype must be \"p\" or \"g\"".into(),
            ));
        }
        if input.v0.is_empty() || input.v1.is_empty() {
            return Err(AuthError::Validation("v0 and v1 must not be empty".into()));
        }

        let v2 = if input.ptype == PTYPE_POLICY {
            if input.v2.is_empty() {
                return Err(AuthError::Validation(
                    "\"p\" rules require a method in v2".into(),
                ));
            }
            input.v2.to_uppercase()
        } else {
            // "g" rules carry no method.
            String::new()
        };

        let rule = PolicyRule {
            id: PolicyRule::rule_id(&input.ptype, &input.v0, &input.v1, &v2),
            ptype: input.ptype,
            v0: input.v0,
            v1: input.v1,
            v2,
            created_at: now_rfc3339(),
        };

        self.insert_record(
            "policy_rules",
            &rule.id,
            &rule,
            &[
                ("ptype", Value::Text(rule.ptype.clone())),
                ("v0", Value::Text(rule.v0.clone())),
                ("created_at", Value::Text(rule.created_at.clone())),
            ],
        )?;

        self.reload_matcher()?;
        Ok(rule)
    }

    /// Delete a policy rule and rebuild the matcher.
    pub fn delete_policy_rule(&self, id: &str) -> Result<(), AuthError> {
        self.delete_record("policy_rules", id)?;
        self.reload_matcher()
    }

    /// List policy rules, optionally filtered by ptype and subject.
    pub fn list_policy_rules(
        &self,
        ptype: Option<&str>,
        v0: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<ListResult<PolicyRule>, AuthError> {
        let mut filters: Vec<(&str, Value)> = Vec::new();
        if let Some(ptype) = ptype {
            filters.push(("ptype", Value::Text(ptype.to_string())));
        }
        if let Some(v0) = v0 {
            filters.push(("v0", Value::Text(v0.to_string())));
        }

        let (items, total) = self.list_records("policy_rules", &filters, limit, offset)?;
        Ok(ListResult { items, total })
    }

    /// Rebuild the in-memory matcher from the policy_rules table and
    /// swap it in. Requests running on the previous snapshot finish on
    /// it undisturbed.
    pub fn reload_matcher(&self) -> Result<(), AuthError> {
        let rows = self
            .sql
            .query("SELECT data FROM policy_rules", &[])
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let mut rules = Vec::new();
        for row in &rows {
            if let Some(data) = row.get_str("data") {
                let rule: PolicyRule =
                    serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))?;
                rules.push(rule);
            }
        }

        let next = Arc::new(Matcher::from_rules(&rules));
        *self.matcher.write().unwrap_or_else(|e| e.into_inner()) = next;
        Ok(())
    }

    /// The current matcher snapshot.
    pub fn matcher(&self) -> Arc<Matcher> {
        self.matcher.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Evaluate a subject/path/method triple against the live rules.
    pub fn enforce(&self, sub: &str, obj: &str, act: &str) -> bool {
        self.matcher().enforce(sub, obj, act)
    }
}
