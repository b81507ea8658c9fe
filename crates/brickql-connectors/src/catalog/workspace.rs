//! Workspace objects: secret scopes, secrets, repos and tokens.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::pagination::Pagination;
use crate::table::{GetConfig, HydrateConfig, ListConfig, ParentConfig, TableDef, EQ};

pub fn workspace_scope() -> TableDef {
    TableDef::new(
        "databricks_workspace_scope",
        "List all secret scopes available in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/secrets/scopes/list", "scopes"),
    )
    .columns(vec![
        ColumnDef::string("name", "A unique name to identify the secret scope."),
        ColumnDef::string("backend_type", "The type of secret scope backend."),
        ColumnDef::json("acls", "The access control list for the secret scope.")
            .hydrate_path("acls", "items"),
        ColumnDef::json("keyvault_metadata", "The metadata for the secret scope if the type is AZURE_KEYVAULT."),
        ColumnDef::title("name"),
    ])
    .hydrate(HydrateConfig::new("acls", "/api/2.0/secrets/acls/list").param("scope", "name"))
}

pub fn workspace_secret() -> TableDef {
    TableDef::new(
        "databricks_workspace_secret",
        "List all secret keys stored in a secret scope.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/secrets/list", "secrets").parent(ParentConfig {
            path: "/api/2.0/secrets/scopes/list",
            items_field: "scopes",
            pagination: Pagination::None,
            max_page_size: 100,
            key_field: "name",
            param: "scope",
            key_column: "scope_name",
        }),
    )
    .columns(vec![
        ColumnDef::string("scope_name", "The name of the scope the secret belongs to.")
            .parent("name"),
        ColumnDef::string("key", "A unique name to identify the secret."),
        ColumnDef::timestamp(
            "last_updated_timestamp",
            "The last updated timestamp for the secret.",
        ),
        ColumnDef::title("key"),
    ])
    .key_column("scope_name", EQ)
}

pub fn workspace_repo() -> TableDef {
    TableDef::new(
        "databricks_workspace_repo",
        "List all repos in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/repos", "repos")
            .paginated(
                Pagination::Token {
                    size_param: None,
                    token_param: "next_page_token",
                    token_field: "next_page_token",
                    has_more_field: None,
                },
                100,
            )
            .param("path", "path_prefix"),
    )
    .columns(vec![
        ColumnDef::int("id", "ID of the repo object in the workspace."),
        ColumnDef::string("path", "Desired path for the repo in the workspace."),
        ColumnDef::string("branch", "Branch that the local version of the repo is checked out to."),
        ColumnDef::string("head_commit_id", "SHA-1 hash representing the commit ID of the current HEAD of the repo."),
        ColumnDef::string("provider", "Git provider."),
        ColumnDef::string("url", "URL of the Git repository to be linked."),
        ColumnDef::json("sparse_checkout_patterns", "List of patterns to include for sparse checkout.")
            .path("sparse_checkout.patterns"),
        ColumnDef::title("path"),
    ])
    .get(GetConfig::path("id", "/api/2.0/repos/{key}"))
    .key_column("id", EQ)
    .key_column("path", EQ)
}

pub fn settings_token() -> TableDef {
    TableDef::new(
        "databricks_settings_token",
        "List all the valid tokens for a user-workspace pair.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/token/list", "token_infos"),
    )
    .columns(vec![
        ColumnDef::string("token_id", "The ID of this token."),
        ColumnDef::string("comment", "Comment the token was created with, if applicable."),
        ColumnDef::timestamp("creation_time", "Server time when the token was created."),
        ColumnDef::timestamp("expiry_time", "Server time when the token will expire, or null if it never expires."),
        ColumnDef::title("token_id"),
    ])
}
