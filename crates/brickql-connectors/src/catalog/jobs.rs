//! Jobs, job runs and pipelines.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::pagination::Pagination;
use crate::table::{GetConfig, HydrateConfig, ListConfig, TableDef, EQ};

const JOBS_MAX_PAGE_SIZE: u64 = 100;
const RUNS_MAX_PAGE_SIZE: u64 = 25;
const PIPELINES_MAX_PAGE_SIZE: u64 = 100;

const JOBS_PAGINATION: Pagination = Pagination::Token {
    size_param: Some("limit"),
    token_param: "page_token",
    token_field: "next_page_token",
    has_more_field: Some("has_more"),
};

pub fn job() -> TableDef {
    TableDef::new(
        "databricks_job",
        "List all the jobs in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.1/jobs/list", "jobs")
            .paginated(JOBS_PAGINATION, JOBS_MAX_PAGE_SIZE)
            .param("name", "name"),
    )
    .columns(vec![
        ColumnDef::int("job_id", "The canonical identifier for this job."),
        ColumnDef::string("name", "The name of the job.").path("settings.name"),
        ColumnDef::timestamp("created_time", "The time at which this job was created."),
        ColumnDef::string("creator_user_name", "The creator user name."),
        ColumnDef::string("format", "Used to tell what is the format of the job.")
            .path("settings.format"),
        ColumnDef::int("max_concurrent_runs", "An optional maximum allowed number of concurrent runs of the job.")
            .path("settings.max_concurrent_runs"),
        ColumnDef::int("timeout_seconds", "An optional timeout applied to each run of this job.")
            .path("settings.timeout_seconds"),
        ColumnDef::json("compute", "A list of compute requirements that can be referenced by tasks of this job.")
            .path("settings.compute"),
        ColumnDef::json("continuous", "An optional continuous property for this job.")
            .path("settings.continuous"),
        ColumnDef::json("email_notifications", "An optional set of email addresses to notify when runs of this job begin or complete.")
            .path("settings.email_notifications"),
        ColumnDef::json("git_source", "An optional specification for a remote Git repository.")
            .path("settings.git_source"),
        ColumnDef::json("job_clusters", "A list of job cluster specifications.")
            .path("settings.job_clusters"),
        ColumnDef::json("notification_settings", "Optional notification settings.")
            .path("settings.notification_settings"),
        ColumnDef::json("parameters", "Job-level parameter definitions.")
            .path("settings.parameters"),
        ColumnDef::json("run_as", "Specifies the user or service principal that the job runs as.")
            .path("settings.run_as"),
        ColumnDef::json("schedule", "An optional periodic schedule for this job.")
            .path("settings.schedule"),
        ColumnDef::json("tags", "A map of tags associated with the job.").path("settings.tags"),
        ColumnDef::json("tasks", "A list of task specifications to be executed by this job.")
            .path("settings.tasks"),
        ColumnDef::json("trigger", "Trigger settings for the job.").path("settings.trigger"),
        ColumnDef::json("trigger_history", "History of the file arrival trigger associated with the job.")
            .detail(),
        ColumnDef::json("webhook_notifications", "A collection of system notification IDs to notify when the run begins or completes.")
            .path("settings.webhook_notifications"),
        ColumnDef::json("job_permissions", "Permissions of the job.").hydrate("permissions"),
        ColumnDef::title("settings.name"),
    ])
    .get(GetConfig::query("job_id", "/api/2.1/jobs/get", "job_id"))
    .hydrate(HydrateConfig::new("permissions", "/api/2.0/permissions/jobs/{job_id}"))
    .key_column("job_id", EQ)
    .key_column("name", EQ)
}

pub fn job_run() -> TableDef {
    TableDef::new(
        "databricks_job_run",
        "List all the job runs in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.1/jobs/runs/list", "runs")
            .paginated(JOBS_PAGINATION, RUNS_MAX_PAGE_SIZE)
            .param("job_id", "job_id")
            .param("run_type", "run_type"),
    )
    .columns(vec![
        ColumnDef::int("run_id", "The canonical identifier of the run."),
        ColumnDef::string("run_name", "An optional name for the run."),
        ColumnDef::int("attempt_number", "The sequence number of this run attempt for a triggered job run."),
        ColumnDef::int("cleanup_duration", "The time in milliseconds it took to terminate the cluster and clean up any associated artifacts."),
        ColumnDef::string("creator_user_name", "The creator user name."),
        ColumnDef::timestamp("end_time", "The time at which this run ended."),
        ColumnDef::int("execution_duration", "The time in milliseconds it took to execute the commands in the JAR or notebook."),
        ColumnDef::int("job_id", "The canonical identifier of the job that contains this run."),
        ColumnDef::int("number_in_job", "A unique identifier for this job run."),
        ColumnDef::int("original_attempt_run_id", "If this run is a retry of a prior run attempt, this field contains the run_id of the original attempt."),
        ColumnDef::int("run_duration", "The time in milliseconds it took the job run and all of its repairs to finish."),
        ColumnDef::string("run_page_url", "The URL to the detail page of the run."),
        ColumnDef::string("run_type", "The type of the run."),
        ColumnDef::int("setup_duration", "The time in milliseconds it took to set up the cluster."),
        ColumnDef::timestamp("start_time", "The time at which this run was started."),
        ColumnDef::string("trigger", "The type of trigger that fired this run."),
        ColumnDef::json("cluster_instance", "The cluster used for this run."),
        ColumnDef::json("cluster_spec", "A snapshot of the job's cluster specification when this run was created."),
        ColumnDef::json("continuous", "The continuous trigger that triggered this run."),
        ColumnDef::json("git_source", "An optional specification for a remote Git repository."),
        ColumnDef::json("job_clusters", "A list of job cluster specifications."),
        ColumnDef::json("job_parameters", "Job-level parameters used in the run."),
        ColumnDef::json("overriding_parameters", "The parameters used for this run."),
        ColumnDef::json("repair_history", "The repair history of the run.").detail(),
        ColumnDef::json("schedule", "The cron schedule that triggered this run."),
        ColumnDef::json("state", "The current state of the run."),
        ColumnDef::json("tasks", "The list of tasks performed by the run."),
        ColumnDef::title("run_name"),
    ])
    .get(GetConfig::query("run_id", "/api/2.1/jobs/runs/get", "run_id"))
    .key_column("run_id", EQ)
    .key_column("job_id", EQ)
    .key_column("run_type", EQ)
}

pub fn pipeline() -> TableDef {
    TableDef::new(
        "databricks_pipeline",
        "List pipelines defined in the Delta Live Tables system.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/pipelines", "statuses")
            .paginated(Pagination::token("max_results"), PIPELINES_MAX_PAGE_SIZE),
    )
    .columns(vec![
        ColumnDef::string("pipeline_id", "Unique identifier of pipeline."),
        ColumnDef::string("name", "The user-friendly name of the pipeline."),
        ColumnDef::string("cluster_id", "The unique identifier of the cluster running the pipeline."),
        ColumnDef::string("creator_user_name", "The username of the pipeline creator."),
        ColumnDef::string("run_as_user_name", "The username that the pipeline runs as."),
        ColumnDef::string("state", "The pipeline state."),
        ColumnDef::string("health", "The health of a pipeline.").detail(),
        ColumnDef::timestamp("last_modified", "The last time the pipeline settings were modified or created.")
            .detail(),
        ColumnDef::json("latest_updates", "Status of the latest updates for the pipeline."),
        ColumnDef::json("spec", "The pipeline specification.").detail(),
        ColumnDef::json("pipeline_permissions", "Permissions of the pipeline.").hydrate("permissions"),
        ColumnDef::title("name"),
    ])
    .get(GetConfig::path("pipeline_id", "/api/2.0/pipelines/{key}"))
    .hydrate(HydrateConfig::new(
        "permissions",
        "/api/2.0/permissions/pipelines/{pipeline_id}",
    ))
    .key_column("pipeline_id", EQ)
}
