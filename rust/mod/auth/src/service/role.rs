use boilerplate_core::{new_id, now_rfc3339};
use boilerplate_sql::Value;

use crate::model::{CreateRole, Role};
use crate::service::{AuthError, AuthService};

impl AuthService {
    /// Create a new role. Names are unique.
    pub fn create_role(&self, input: CreateRole) -> Result<Role, AuthError> {
        if input.name.is_empty() {
            return Err(AuthError::Validation("role name must not be empty".into()));
        }

        let now = now_rfc3339();
        let role = Role {
            id: new_id(),
            name: input.name,
            status: true,
            data_scope: input.data_scope,
            remark: input.remark,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        self.insert_record(
            "roles",
            &role.id,
            &role,
            &[
                ("name", Value::Text(role.name.clone())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now)),
            ],
        )?;

        Ok(role)
    }

    /// Get a role by id.
    pub fn get_role(&self, id: &str) -> Result<Role, AuthError> {
        self.get_record("roles", id)
    }

    /// Look up a role by its unique name.
    pub fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        let rows = self
            .sql
            .query(
                "SELECT data FROM roles WHERE name = ?1",
                &[Value::Text(name.to_string())],
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let data = row
            .get_str("data")
            .ok_or_else(|| AuthError::Internal("missing data column".into()))?;
        let role = serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(Some(role))
    }

    /// Assign a role to a user. Already-assigned pairs are a no-op.
    pub fn assign_role(&self, user_id: &str, role_id: &str) -> Result<(), AuthError> {
        self.sql
            .exec(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id, added_at) VALUES (?1, ?2, ?3)",
                &[
                    Value::Text(user_id.to_string()),
                    Value::Text(role_id.to_string()),
                    Value::Text(now_rfc3339()),
                ],
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(())
    }

    /// All roles assigned to a user.
    pub fn user_roles(&self, user_id: &str) -> Result<Vec<Role>, AuthError> {
        let rows = self
            .sql
            .query(
                "SELECT r.data FROM roles r \
                 JOIN user_roles ur ON ur.role_id = r.id \
                 WHERE ur.user_id = ?1",
                &[Value::Text(user_id.to_string())],
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let mut roles = Vec::new();
        for row in &rows {
            if let Some(data) = row.get_str("data") {
                let role: Role =
                    serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))?;
                roles.push(role);
            }
        }
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AuthConfig;
    use boilerplate_sql::sqlite::SqliteStore;

    fn test_service() -> std::sync::Arc<AuthService> {
        let sql = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = std::sync::Arc::new(boilerplate_kv::redb::RedbStore::open(tmp.path()).unwrap());
        AuthService::new(sql, kv, AuthConfig::default()).unwrap()
    }

    fn create_role(svc: &AuthService, name: &str) -> Role {
        svc.create_role(CreateRole {
            name: name.to_string(),
            data_scope: crate::model::DATA_SCOPE_SCOPED,
            remark: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_lookup_role() {
        let svc = test_service();
        let role = create_role(&svc, "ops");

        assert_eq!(svc.get_role(&role.id).unwrap().name, "ops");
        assert_eq!(svc.get_role_by_name("ops").unwrap().unwrap().id, role.id);
        assert!(svc.get_role_by_name("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_role_name_conflicts() {
        let svc = test_service();
        create_role(&svc, "ops");

        let err = svc
            .create_role(CreateRole {
                name: "ops".to_string(),
                data_scope: crate::model::DATA_SCOPE_SCOPED,
                remark: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[test]
    fn test_assign_role_is_idempotent() {
        let svc = test_service();
        let role = create_role(&svc, "ops");

        let user = svc.create_root_user("root@example.com", "unused-hash").unwrap();
        svc.assign_role(&user.id, &role.id).unwrap();
        svc.assign_role(&user.id, &role.id).unwrap();

        let roles = svc.user_roles(&user.id).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "ops");
    }
}
