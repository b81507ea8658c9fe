//! Account-scope tables: account SCIM identities and budgets.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::pagination::Pagination;
use crate::table::{GetConfig, ListConfig, TableDef, EQ, EQ_NE};

/// SCIM list endpoints accept up to this many items per page.
pub(crate) const SCIM_MAX_PAGE_SIZE: u64 = 10_000;

pub fn iam_account_user() -> TableDef {
    TableDef::new(
        "databricks_iam_account_user",
        "List details for all the users associated with a Databricks account.",
        Scope::Account,
        ListConfig::new("/api/2.0/accounts/{account_id}/scim/v2/Users", "Resources")
            .paginated(Pagination::scim(), SCIM_MAX_PAGE_SIZE)
            .filter("id", "id")
            .filter("user_name", "userName")
            .filter("display_name", "displayName"),
    )
    .columns(vec![
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
    ])
    .get(
        GetConfig::path("id", "/api/2.0/accounts/{account_id}/scim/v2/Users/{key}")
            .not_found(&["SCIM_404"]),
    )
    .key_column("id", EQ_NE)
    .key_column("user_name", EQ_NE)
    .key_column("display_name", EQ_NE)
}

pub fn iam_account_group() -> TableDef {
    TableDef::new(
        "databricks_iam_account_group",
        "List details for all the groups associated with a Databricks account.",
        Scope::Account,
        ListConfig::new("/api/2.0/accounts/{account_id}/scim/v2/Groups", "Resources")
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
    .get(
        GetConfig::path("id", "/api/2.0/accounts/{account_id}/scim/v2/Groups/{key}")
            .not_found(&["SCIM_404"]),
    )
    .key_column("id", EQ)
    .key_column("display_name", EQ_NE)
}

pub fn iam_account_service_principal() -> TableDef {
    TableDef::new(
        "databricks_iam_account_service_principal",
        "List details for all the service principals associated with a Databricks account.",
        Scope::Account,
        ListConfig::new(
            "/api/2.0/accounts/{account_id}/scim/v2/ServicePrincipals",
            "Resources",
        )
        .paginated(Pagination::scim(), SCIM_MAX_PAGE_SIZE)
        .filter("display_name", "displayName"),
    )
    .columns(vec![
        ColumnDef::string("id", "Databricks service principal ID."),
        ColumnDef::string("display_name", "String that represents a concatenation of given and family names."),
        ColumnDef::bool("active", "Whether the service principal is active."),
        ColumnDef::string("application_id", "UUID relating to the service principal."),
        ColumnDef::string("external_id", "External ID of the service principal."),
        ColumnDef::json("entitlements", "All the entitlements associated with the service principal."),
        ColumnDef::json("groups", "All the groups the service principal belongs to."),
        ColumnDef::json("roles", "All the roles associated with the service principal."),
        ColumnDef::title("displayName"),
    ])
    .get(
        GetConfig::path(
            "id",
            "/api/2.0/accounts/{account_id}/scim/v2/ServicePrincipals/{key}",
        )
        .not_found(&["SCIM_404"]),
    )
    .key_column("id", EQ)
    .key_column("display_name", EQ_NE)
}

pub fn account_budget() -> TableDef {
    TableDef::new(
        "databricks_account_budget",
        "List all budgets associated to this account.",
        Scope::Account,
        ListConfig::new("/api/2.0/accounts/{account_id}/budget", "budgets"),
    )
    .columns(vec![
        ColumnDef::string("budget_id", "Databricks budget ID."),
        ColumnDef::string("name", "Human-readable name of the budget."),
        ColumnDef::timestamp("creation_time", "Time when the budget was created."),
        ColumnDef::string("end_date", "Optional end date of the budget."),
        ColumnDef::string("filter", "SQL-like filter expression with workspaceId, SKU and tag."),
        ColumnDef::string("period", "Period length in years, months, weeks and/or days."),
        ColumnDef::timestamp("start_date", "Start date of the budget period calculation."),
        ColumnDef::string("target_amount", "Target amount of the budget per period in USD."),
        ColumnDef::timestamp("update_time", "Time when the budget was last updated."),
        ColumnDef::json("alerts", "Alerts configured for the budget."),
        ColumnDef::json("status_daily", "Amount used in the budget for each day."),
        ColumnDef::title("name"),
    ])
    .get(
        GetConfig::path("budget_id", "/api/2.0/accounts/{account_id}/budget/{key}")
            .item_field("budget"),
    )
    .key_column("budget_id", EQ)
}
