//! Workspace identities over the workspace SCIM API.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::pagination::Pagination;
use crate::table::{GetConfig, ListConfig, TableDef, EQ, EQ_NE};

use super::account::SCIM_MAX_PAGE_SIZE;

fn user_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::string("id", "Databricks user ID."),
        ColumnDef::string("user_name", "Email address of the Databricks user."),
        ColumnDef::bool("active", "Whether the user is active."),
        ColumnDef::string(
            "display_name",
            "String that represents a concatenation of given and family names.",
        ),
        ColumnDef::string("external_id", "External ID of the user."),
        ColumnDef::json("emails", "All the emails associated with the Databricks user."),
        ColumnDef::json("entitlements", "All the entitlements associated with the Databricks user."),
        ColumnDef::json("groups", "All the groups the user belongs to."),
        ColumnDef::json("name", "Name of the user."),
        ColumnDef::json("roles", "All the roles associated with the Databricks user."),
        ColumnDef::title("displayName"),
    ]
}

pub fn iam_user() -> TableDef {
    TableDef::new(
        "databricks_iam_user",
        "List details for all the users associated with a Databricks workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/preview/scim/v2/Users", "Resources")
            .paginated(Pagination::scim(), SCIM_MAX_PAGE_SIZE)
            .filter("id", "id")
            .filter("user_name", "userName")
            .filter("display_name", "displayName"),
    )
    .columns(user_columns())
    .get(GetConfig::path("id", "/api/2.0/preview/scim/v2/Users/{key}").not_found(&["SCIM_404"]))
    .key_column("id", EQ_NE)
    .key_column("user_name", EQ_NE)
    .key_column("display_name", EQ_NE)
}

pub fn iam_group() -> TableDef {
    TableDef::new(
        "databricks_iam_group",
        "List details for all the groups associated with a Databricks workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/preview/scim/v2/Groups", "Resources")
            .paginated(Pagination::scim(), SCIM_MAX_PAGE_SIZE)
            .filter("display_name", "displayName"),
    )
    .columns(vec![
        ColumnDef::string("id", "Databricks group ID."),
        ColumnDef::string("display_name", "String that represents a human-readable group name."),
        ColumnDef::string("external_id", "External ID of the group."),
        ColumnDef::json("entitlements", "All the entitlements associated with the group."),
        ColumnDef::json("groups", "All the groups the group belongs to."),
        ColumnDef::json("members", "All the members of the group."),
        ColumnDef::json("meta", "Container for the group identifier."),
        ColumnDef::json("roles", "All the roles associated with the group."),
        ColumnDef::title("displayName"),
    ])
    .get(GetConfig::path("id", "/api/2.0/preview/scim/v2/Groups/{key}").not_found(&["SCIM_404"]))
    .key_column("id", EQ)
    .key_column("display_name", EQ_NE)
}

pub fn iam_current_user() -> TableDef {
    TableDef::new(
        "databricks_iam_current_user",
        "Get details about the current user or service principal.",
        Scope::Workspace,
        ListConfig::single("/api/2.0/preview/scim/v2/Me"),
    )
    .columns(user_columns())
}
