//! Compute tables: clusters.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::table::{GetConfig, HydrateConfig, ListConfig, TableDef, EQ};

pub fn compute_cluster() -> TableDef {
    TableDef::new(
        "databricks_compute_cluster",
        "List all the clusters in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/clusters/list", "clusters"),
    )
    .columns(vec![
        ColumnDef::string("cluster_id", "Canonical identifier for the cluster."),
        ColumnDef::string("cluster_name", "Cluster name requested by the user."),
        ColumnDef::int(
            "autotermination_minutes",
            "Automatically terminates the cluster after it is inactive for this time in minutes.",
        ),
        ColumnDef::double("cluster_cores", "Number of CPU cores available for this cluster."),
        ColumnDef::double("cluster_memory_mb", "Total amount of cluster memory, in megabytes."),
        ColumnDef::json("cluster_source", "Determines whether the cluster was created by a user through the UI, by the Databricks Jobs Scheduler, or through an API request."),
        ColumnDef::string("creator_user_name", "Creator user name."),
        ColumnDef::string("data_security_mode", "Data security mode decides what data governance model to use when accessing data from a cluster."),
        ColumnDef::string("driver_instance_pool_id", "The optional ID of the instance pool for the driver of the cluster belongs."),
        ColumnDef::string("driver_node_type_id", "The node type of the Spark driver."),
        ColumnDef::bool("enable_elastic_disk", "Autoscaling Local Storage."),
        ColumnDef::bool("enable_local_disk_encryption", "Whether to enable LUKS on cluster VMs' local disks."),
        ColumnDef::string("instance_pool_id", "The optional ID of the instance pool to which the cluster belongs."),
        ColumnDef::int("jdbc_port", "Port on which Spark JDBC server is listening, in the driver nod."),
        ColumnDef::timestamp("last_restarted_time", "The time when the cluster was started/restarted."),
        ColumnDef::timestamp("last_state_loss_time", "Time when the cluster driver last lost its state."),
        ColumnDef::string("node_type_id", "The node type of the Spark worker."),
        ColumnDef::int("num_workers", "Number of worker nodes that this cluster should have."),
        ColumnDef::string("policy_id", "The ID of the cluster policy used to create the cluster if applicable."),
        ColumnDef::string("runtime_engine", "Decides which runtime engine to be use."),
        ColumnDef::string("single_user_name", "Single user name if data_security_mode is SINGLE_USER."),
        ColumnDef::string("spark_context_id", "A canonical SparkContext identifier."),
        ColumnDef::string("spark_version", "The Spark version of the cluster."),
        ColumnDef::timestamp("start_time", "Time when the cluster creation request was received."),
        ColumnDef::string("state", "Current state of the cluster."),
        ColumnDef::string("state_message", "A message associated with the most recent state transition."),
        ColumnDef::timestamp("terminated_time", "Time when the cluster was terminated."),
        ColumnDef::json("autoscale", "Parameters needed in order to automatically scale clusters up and down based on load."),
        ColumnDef::json("aws_attributes", "Attributes related to clusters running on Amazon Web Services."),
        ColumnDef::json("azure_attributes", "Attributes related to clusters running on Microsoft Azure."),
        ColumnDef::json("cluster_log_conf", "The configuration for delivering spark logs to a long-term storage destination."),
        ColumnDef::json("cluster_log_status", "Cluster log delivery status."),
        ColumnDef::json("custom_tags", "Additional tags for cluster resources."),
        ColumnDef::json("default_tags", "Tags that are added by Databricks regardless of any custom_tags."),
        ColumnDef::json("docker_image", "Docker image for the cluster."),
        ColumnDef::json("driver", "Node on which the Spark driver resides."),
        ColumnDef::json("executors", "Nodes on which the Spark executors reside."),
        ColumnDef::json("gcp_attributes", "Attributes related to clusters running on Google Cloud Platform."),
        ColumnDef::json("init_scripts", "The configuration for storing init scripts."),
        ColumnDef::json("cluster_permissions", "Permissions of the cluster.").hydrate("permissions"),
        ColumnDef::json("spark_conf", "An object containing a set of optional, user-specified Spark configuration key-value pairs."),
        ColumnDef::json("spark_env_vars", "An object containing a set of optional, user-specified environment variable key-value pairs."),
        ColumnDef::json("ssh_public_keys", "SSH public key contents that will be added to each Spark node in this cluster."),
        ColumnDef::json("termination_reason", "Information about why the cluster was terminated."),
        ColumnDef::json("workload_type_client", "Defines what type of clients can use the cluster.")
            .path("workload_type.clients"),
        ColumnDef::title("cluster_name"),
    ])
    .get(GetConfig::query("cluster_id", "/api/2.0/clusters/get", "cluster_id"))
    .hydrate(HydrateConfig::new(
        "permissions",
        "/api/2.0/permissions/clusters/{cluster_id}",
    ))
    .key_column("cluster_id", EQ)
}
