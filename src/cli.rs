use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kestrel",
    version,
    about = "A live three-panel terminal dashboard for Kubernetes workloads."
)]
pub struct CliArgs {
    /// Resource kinds to watch (deploy, sts, ds, rs, po, svc, job, cj, node, ns).
    /// Deployments when neither this flag nor the config file names any.
    #[arg(short, long = "resource", value_name = "KIND")]
    pub resources: Vec<String>,

    /// Restrict watches to one namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Extra cluster labels for the cluster panel
    #[arg(short, long = "cluster", value_name = "NAME")]
    pub clusters: Vec<String>,

    /// kubeconfig context to use instead of the current one
    #[arg(long)]
    pub context: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file; logging is discarded otherwise
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn defaults_leave_kinds_unset() {
        let args = CliArgs::parse_from(["kestrel"]);
        assert!(args.resources.is_empty());
        assert_eq!(args.namespace, None);
        assert!(args.clusters.is_empty());
        assert_eq!(args.log_filter, "info");
    }

    #[test]
    fn repeated_flags_accumulate() {
        let args = CliArgs::parse_from([
            "kestrel", "-r", "sts", "--resource", "po", "-c", "prod", "-c", "dev", "-n", "apps",
        ]);
        assert_eq!(args.resources, vec!["sts", "po"]);
        assert_eq!(args.clusters, vec!["prod", "dev"]);
        assert_eq!(args.namespace.as_deref(), Some("apps"));
    }
}
