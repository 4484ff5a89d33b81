use boilerplate_sql::SQLStore;

use crate::service::AuthError;

/// Initialize the SQLite schema for all auth resources.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), AuthError> {
    let statements = [
        // Users table: core identity and credentials
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            status INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_users_status ON users(status)",

        // Roles table: named permission subjects
        "CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // User/role assignments
        "CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            added_at TEXT NOT NULL,
            PRIMARY KEY (user_id, role_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role_id)",

        // Policy rules: "p" permission tuples and "g" grouping tuples
        "CREATE TABLE IF NOT EXISTS policy_rules (
            id TEXT PRIMARY KEY,
            ptype TEXT NOT NULL,
            v0 TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_policy_rules_ptype ON policy_rules(ptype)",
        "CREATE INDEX IF NOT EXISTS idx_policy_rules_v0 ON policy_rules(v0)",

        // Login audit trail
        "CREATE TABLE IF NOT EXISTS login_logs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            status INTEGER NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_login_logs_user ON login_logs(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_login_logs_created ON login_logs(created_at)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])
            .map_err(|e| AuthError::Storage(e.to_string()))?;
    }

    Ok(())
}
