// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::{controller::Action, reflector, watcher, Controller};
use kube::{Api, Client, ResourceExt};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use machine_controller::constants::{
    DEFAULT_JOIN_CLUSTER_TIMEOUT_SECS, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_RENEW_DEADLINE_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, DEFAULT_SKIP_EVICT_AFTER_SECS,
    DEFAULT_WORKER_COUNT, ERROR_REQUEUE_DURATION_SECS, HEALTH_PROBE_BIND_ADDRESS, HEALTH_PROBE_PORT,
    KIND_MACHINE, KIND_MACHINE_DEPLOYMENT, KIND_MACHINE_SET, KUBE_CLIENT_BURST, KUBE_CLIENT_QPS,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
};
use machine_controller::context::{Context, Stores};
use machine_controller::crd::{Machine, MachineDeployment, MachineSet};
use machine_controller::csr_approver::reconcile_csr;
use machine_controller::metrics;
use machine_controller::provider::config::ConfigVarResolver;
use machine_controller::provider::registry::ProviderRegistry;
use machine_controller::reconcilers::{
    reconcile_machine, reconcile_machine_deployment, reconcile_machine_set,
};
use machine_controller::userdata::OpaqueUserdataProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// `machine-controller`: a declarative lifecycle controller for Kubernetes worker nodes
/// backed by cloud-provider virtual machines.
#[derive(Parser, Debug, Clone)]
#[command(name = "machine-controller", version, about)]
struct Opts {
    /// How long an unbound Machine may exist before it is deleted for its owning
    /// MachineSet to retry, in seconds.
    #[arg(long = "join-cluster-timeout", env = "MACHINE_CONTROLLER_JOIN_CLUSTER_TIMEOUT", default_value_t = DEFAULT_JOIN_CLUSTER_TIMEOUT_SECS)]
    join_cluster_timeout: u64,

    /// How long past `deletionTimestamp` pod eviction is still attempted before it is
    /// skipped outright, in seconds.
    #[arg(long = "skip-evict-after", env = "MACHINE_CONTROLLER_SKIP_EVICT_AFTER", default_value_t = DEFAULT_SKIP_EVICT_AFTER_SECS)]
    skip_evict_after: u64,

    /// Number of concurrent reconcile workers per controller.
    #[arg(long = "worker-count", env = "MACHINE_CONTROLLER_WORKER_COUNT", default_value_t = DEFAULT_WORKER_COUNT)]
    worker_count: usize,

    /// Enable leader election for high availability.
    #[arg(long = "leader-elect", env = "MACHINE_CONTROLLER_LEADER_ELECT", default_value_t = true)]
    leader_elect: bool,

    /// Bind address for the Prometheus metrics HTTP server.
    #[arg(long = "metrics-address", env = "MACHINE_CONTROLLER_METRICS_ADDRESS", default_value_t = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}"))]
    metrics_address: String,

    /// Bind address for the health-probe HTTP server.
    #[arg(long = "health-probe-address", env = "MACHINE_CONTROLLER_HEALTH_PROBE_ADDRESS", default_value_t = format!("{HEALTH_PROBE_BIND_ADDRESS}:{HEALTH_PROBE_PORT}"))]
    health_probe_address: String,

    /// Run the `NodeCSRApprover` controller alongside the Machine/MachineSet/
    /// MachineDeployment reconcilers.
    #[arg(long = "node-csr-approver", env = "MACHINE_CONTROLLER_NODE_CSR_APPROVER", default_value_t = true)]
    node_csr_approver: bool,

    /// Namespace to restrict watches to; unset watches every namespace.
    #[arg(long = "namespace", env = "MACHINE_CONTROLLER_NAMESPACE")]
    namespace: Option<String>,

    /// Cluster DNS service IP, forwarded to rendered userdata.
    #[arg(long = "cluster-dns", env = "MACHINE_CONTROLLER_CLUSTER_DNS")]
    cluster_dns: Option<String>,

    /// Path to the webhook server's TLS certificate, reserved for a future admission
    /// webhook; currently unused by the reconcile loops themselves.
    #[arg(long = "webhook-cert-path", env = "MACHINE_CONTROLLER_WEBHOOK_CERT_PATH")]
    webhook_cert_path: Option<String>,

    /// Path to the webhook server's TLS private key, reserved for a future admission
    /// webhook.
    #[arg(long = "webhook-key-path", env = "MACHINE_CONTROLLER_WEBHOOK_KEY_PATH")]
    webhook_key_path: Option<String>,
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("machine-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format.
///
/// Respects `RUST_LOG` if set, otherwise defaults to INFO. Respects `RUST_LOG_FORMAT`
/// (`json` or `text`) for output format.
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting machine-controller");
}

/// Initialize the Kubernetes client.
async fn initialize_client() -> Result<Client> {
    debug!("Initializing Kubernetes client");
    let config = kube::Config::infer().await?;

    let qps: f32 = std::env::var("MACHINE_CONTROLLER_KUBE_QPS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(KUBE_CLIENT_QPS);
    let burst: u32 = std::env::var("MACHINE_CONTROLLER_KUBE_BURST")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(KUBE_CLIENT_BURST);

    let client = Client::try_from(config)?;
    info!(qps, burst, "Kubernetes client initialized");
    Ok(client)
}

/// Build reflector stores for `Machine`, `MachineSet`, `MachineDeployment`, and `Node`,
/// spawning a background watcher task per resource kind, then assemble the shared
/// [`Context`].
async fn initialize_shared_context(client: Client, opts: &Opts) -> Result<Arc<Context>> {
    info!("Initializing reflectors for Machine, MachineSet, MachineDeployment, Node");

    let machines_api = Api::<Machine>::all(client.clone());
    let machine_sets_api = Api::<MachineSet>::all(client.clone());
    let machine_deployments_api = Api::<MachineDeployment>::all(client.clone());
    let nodes_api = Api::<Node>::all(client.clone());

    let (machines_store, machines_writer) = reflector::store();
    let (machine_sets_store, machine_sets_writer) = reflector::store();
    let (machine_deployments_store, machine_deployments_writer) = reflector::store();
    let (nodes_store, nodes_writer) = reflector::store();

    tokio::spawn(async move {
        let stream = watcher(machines_api, watcher::Config::default());
        reflector::reflector(machines_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("Machine reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(machine_sets_api, watcher::Config::default());
        reflector::reflector(machine_sets_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("MachineSet reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(machine_deployments_api, watcher::Config::default());
        reflector::reflector(machine_deployments_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("MachineDeployment reflector stream ended");
    });

    tokio::spawn(async move {
        let stream = watcher(nodes_api, watcher::Config::default());
        reflector::reflector(nodes_writer, stream)
            .for_each(|_| futures::future::ready(()))
            .await;
        warn!("Node reflector stream ended");
    });

    let stores = Stores {
        machines: machines_store,
        machine_sets: machine_sets_store,
        machine_deployments: machine_deployments_store,
        nodes: nodes_store,
    };

    let http_client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    let config_resolver = ConfigVarResolver::new(client.clone(), opts.namespace.clone().unwrap_or_default());
    let provider_registry = Arc::new(ProviderRegistry::new(http_client.clone(), config_resolver));

    let context = Arc::new(Context {
        client,
        stores,
        http_client,
        provider_registry,
        userdata_provider: Arc::new(OpaqueUserdataProvider),
        join_cluster_timeout: Duration::from_secs(opts.join_cluster_timeout),
        skip_evict_after: Duration::from_secs(opts.skip_evict_after),
    });

    info!("Shared context initialized");
    Ok(context)
}

/// Start the Prometheus metrics HTTP server.
fn start_metrics_server(bind_address: String) -> tokio::task::JoinHandle<()> {
    info!(bind_address = %bind_address, path = METRICS_SERVER_PATH, "Starting Prometheus metrics HTTP server");

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to gather metrics: {e}");
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
        let listener = match tokio::net::TcpListener::bind(&bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_address}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_address}{METRICS_SERVER_PATH}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Start the `/healthz`/`/readyz` health-probe HTTP server.
fn start_health_probe_server(bind_address: String) -> tokio::task::JoinHandle<()> {
    info!(bind_address = %bind_address, "Starting health-probe HTTP server");

    tokio::spawn(async move {
        async fn healthz() -> &'static str {
            "ok"
        }

        let app = Router::new().route("/healthz", get(healthz)).route("/readyz", get(healthz));
        let listener = match tokio::net::TcpListener::bind(&bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind health-probe server to {bind_address}: {e}");
                return;
            }
        };

        info!("Health-probe server listening on http://{bind_address}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health-probe server error: {e}");
        }
    })
}

/// Leader election configuration resolved from CLI flags/environment.
struct LeaderElectionConfig {
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    renew_deadline: u64,
    retry_period: u64,
}

fn load_leader_election_config(opts: &Opts) -> LeaderElectionConfig {
    let lease_name = std::env::var("MACHINE_CONTROLLER_LEASE_NAME")
        .unwrap_or_else(|_| "machine-controller-leader".to_string());

    let lease_namespace = opts
        .namespace
        .clone()
        .or_else(|| std::env::var("POD_NAMESPACE").ok())
        .unwrap_or_else(|| "kube-system".to_string());

    let lease_duration = std::env::var("MACHINE_CONTROLLER_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let renew_deadline = std::env::var("MACHINE_CONTROLLER_LEASE_RENEW_DEADLINE_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RENEW_DEADLINE_SECS);

    let retry_period = std::env::var("MACHINE_CONTROLLER_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("machine-controller-{}", rand::random::<u32>()));

    LeaderElectionConfig { lease_name, lease_namespace, identity, lease_duration, renew_deadline, retry_period }
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let opts = Opts::parse();
    let client = initialize_client().await?;
    let context = initialize_shared_context(client.clone(), &opts).await?;

    let _metrics_handle = start_metrics_server(opts.metrics_address.clone());
    let _health_handle = start_health_probe_server(opts.health_probe_address.clone());

    if opts.leader_elect {
        let leader_config = load_leader_election_config(&opts);
        info!(
            lease_name = %leader_config.lease_name,
            lease_namespace = %leader_config.lease_namespace,
            identity = %leader_config.identity,
            "Leader election enabled, waiting to acquire leadership..."
        );

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &leader_config.lease_name)
            .with_namespace(&leader_config.lease_namespace)
            .with_identity(&leader_config.identity)
            .with_duration(leader_config.lease_duration)
            .with_grace(leader_config.retry_period)
            .build()
            .await?;

        let (leader_rx, lease_handle) = lease_manager.watch().await;

        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired, starting controllers...");
        metrics::record_leader_elected(&leader_config.identity);
        run_operators_with_leader_election(context, &opts, leader_rx, lease_handle).await?;
    } else {
        warn!("Leader election DISABLED - running without high availability");
        run_operators_without_leader_election(context, &opts).await?;
    }

    Ok(())
}

/// Monitor leadership status; returns once leadership is lost or an error occurs.
async fn monitor_leadership(mut leader_rx: tokio::sync::watch::Receiver<bool>) -> Result<()> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Run all reconcilers concurrently. Each is expected to run forever; if one exits, the
/// whole process treats that as fatal and exits so an orchestrator can restart it.
async fn run_all_operators(context: Arc<Context>, opts: &Opts) -> Result<()> {
    if opts.node_csr_approver {
        tokio::select! {
            result = run_machine_deployment_operator(context.clone(), opts) => {
                error!("CRITICAL: MachineDeployment operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("MachineDeployment operator exited unexpectedly without error")
            }
            result = run_machine_set_operator(context.clone(), opts) => {
                error!("CRITICAL: MachineSet operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("MachineSet operator exited unexpectedly without error")
            }
            result = run_machine_operator(context.clone(), opts) => {
                error!("CRITICAL: Machine operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("Machine operator exited unexpectedly without error")
            }
            result = run_csr_approver_operator(context.clone()) => {
                error!("CRITICAL: NodeCSRApprover operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("NodeCSRApprover operator exited unexpectedly without error")
            }
        }
    } else {
        tokio::select! {
            result = run_machine_deployment_operator(context.clone(), opts) => {
                error!("CRITICAL: MachineDeployment operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("MachineDeployment operator exited unexpectedly without error")
            }
            result = run_machine_set_operator(context.clone(), opts) => {
                error!("CRITICAL: MachineSet operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("MachineSet operator exited unexpectedly without error")
            }
            result = run_machine_operator(context.clone(), opts) => {
                error!("CRITICAL: Machine operator exited unexpectedly: {result:?}");
                result?;
                anyhow::bail!("Machine operator exited unexpectedly without error")
            }
        }
    }
}

/// Run all operators without leader election, with signal handling.
async fn run_operators_without_leader_election(context: Arc<Context>, opts: &Opts) -> Result<()> {
    info!("Starting all operators with signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }
        result = wait_for_sigterm() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
            result
        }
        result = run_all_operators(context, opts) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Run operators with leader election, stepping down (and exiting) if leadership is
/// lost or a shutdown signal arrives.
async fn run_operators_with_leader_election(
    context: Arc<Context>,
    opts: &Opts,
    leader_rx: tokio::sync::watch::Receiver<bool>,
    _lease_handle: tokio::task::JoinHandle<Result<LeaseManager, kube_lease_manager::LeaseManagerError>>,
) -> Result<()> {
    info!("Running operators with leader election and signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }
        result = wait_for_sigterm() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
            result
        }
        result = monitor_leadership(leader_rx) => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping all operators...");
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {e:?}");
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }
        result = run_all_operators(context, opts) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully, leader election lease released");
    Ok(())
}

async fn wait_for_sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Run the `MachineDeployment` controller: watches `MachineDeployment`s and owned
/// `MachineSet`s.
async fn run_machine_deployment_operator(context: Arc<Context>, opts: &Opts) -> Result<()> {
    info!("Starting MachineDeployment operator");

    let client = context.client.clone();
    let api = namespaced_or_all::<MachineDeployment>(&client, opts.namespace.as_deref());
    let machine_sets_api = namespaced_or_all::<MachineSet>(&client, opts.namespace.as_deref());

    Controller::new(api, watcher::Config::default())
        .owns(machine_sets_api, watcher::Config::default())
        .run(reconcile_machine_deployment_wrapper, error_policy, context)
        .for_each_concurrent(opts.worker_count, |_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_machine_deployment_wrapper(
    md: Arc<MachineDeployment>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let name = md.name_any();
    debug!(machine_deployment = %name, "reconcile wrapper called");

    let result = reconcile_machine_deployment(md, ctx).await;
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_MACHINE_DEPLOYMENT, duration);
            Ok(action)
        }
        Err(e) => {
            error!(machine_deployment = %name, error = %e, "failed to reconcile MachineDeployment");
            metrics::record_reconciliation_error(KIND_MACHINE_DEPLOYMENT, duration);
            Err(e.into())
        }
    }
}

/// Run the `MachineSet` controller: watches `MachineSet`s and owned `Machine`s.
async fn run_machine_set_operator(context: Arc<Context>, opts: &Opts) -> Result<()> {
    info!("Starting MachineSet operator");

    let client = context.client.clone();
    let api = namespaced_or_all::<MachineSet>(&client, opts.namespace.as_deref());
    let machines_api = namespaced_or_all::<Machine>(&client, opts.namespace.as_deref());

    Controller::new(api, watcher::Config::default())
        .owns(machines_api, watcher::Config::default())
        .run(reconcile_machine_set_wrapper, error_policy, context)
        .for_each_concurrent(opts.worker_count, |_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_machine_set_wrapper(
    ms: Arc<MachineSet>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let name = ms.name_any();
    debug!(machine_set = %name, "reconcile wrapper called");

    let result = reconcile_machine_set(ms, ctx).await;
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_MACHINE_SET, duration);
            Ok(action)
        }
        Err(e) => {
            error!(machine_set = %name, error = %e, "failed to reconcile MachineSet");
            metrics::record_reconciliation_error(KIND_MACHINE_SET, duration);
            Err(e.into())
        }
    }
}

/// Run the `Machine` controller: watches `Machine`s and their bound `Node`s.
async fn run_machine_operator(context: Arc<Context>, opts: &Opts) -> Result<()> {
    info!("Starting Machine operator");

    let client = context.client.clone();
    let api = namespaced_or_all::<Machine>(&client, opts.namespace.as_deref());
    let nodes_api = Api::<Node>::all(client.clone());
    let ctx_for_nodes = context.clone();

    Controller::new(api, watcher::Config::default())
        .watches(nodes_api, watcher::Config::default(), move |node| {
            let node_name = node.name_any();
            ctx_for_nodes
                .stores
                .machines
                .state()
                .into_iter()
                .filter(|m| m.status.as_ref().and_then(|s| s.node_ref.as_ref()).and_then(|r| r.name.as_deref()) == Some(node_name.as_str()))
                .filter_map(|m| m.namespace().map(|ns| kube::runtime::reflector::ObjectRef::new(&m.name_any()).within(&ns)))
                .collect::<Vec<_>>()
        })
        .run(reconcile_machine_wrapper, error_policy, context)
        .for_each_concurrent(opts.worker_count, |_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_machine_wrapper(machine: Arc<Machine>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let name = machine.name_any();
    debug!(machine = %name, "reconcile wrapper called");

    let result = reconcile_machine(machine, ctx).await;
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_MACHINE, duration);
            Ok(action)
        }
        Err(e) => {
            error!(machine = %name, error = %e, "failed to reconcile Machine");
            metrics::record_reconciliation_error(KIND_MACHINE, duration);
            Err(e.into())
        }
    }
}

/// Run the `NodeCSRApprover` controller: watches kubelet-serving CSRs.
async fn run_csr_approver_operator(context: Arc<Context>) -> Result<()> {
    info!("Starting NodeCSRApprover operator");

    let client = context.client.clone();
    let api = Api::<CertificateSigningRequest>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_csr_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

async fn reconcile_csr_wrapper(
    csr: Arc<CertificateSigningRequest>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let name = csr.name_any();
    reconcile_csr(csr, ctx).await.map_err(|e| {
        error!(csr = %name, error = %e, "failed to reconcile CertificateSigningRequest");
        ReconcileError::from(e)
    })
}

/// An `Api<T>` scoped to `namespace`, or cluster-wide if unset.
fn namespaced_or_all<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + for<'de> serde::Deserialize<'de>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Error policy for controllers: requeue after a fixed backoff.
///
/// An `Action` to requeue the resource after `ERROR_REQUEUE_DURATION_SECS` seconds.
#[allow(clippy::needless_pass_by_value)]
fn error_policy<T, C>(resource: Arc<T>, err: &ReconcileError, _ctx: Arc<C>) -> Action
where
    T: std::fmt::Debug,
{
    error!(error = %err, resource = ?resource, "Reconciliation error - will retry in {}s", ERROR_REQUEUE_DURATION_SECS);
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
