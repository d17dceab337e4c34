//! Navigation bridge executable entry point.
//!
//! # Architecture
//!
//! - Telemetry from the navigation stack is received by the `TelemClient` threads, one per
//!   channel, and kept in the `TelemetryStore`.
//! - Web clients connect over HTTP. Each WebSocket connection gets its own tick task in the
//!   `ConnectionManager`, streaming snapshots of the store.
//! - Goals selected by the operator are validated by the `GoalDispatcher` and published to the
//!   planner by the `GoalClient`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use std::{path::PathBuf, sync::Arc, time::Instant};
use structopt::StructOpt;

// Internal
use bridge_lib::{
    conn_mgr::ConnectionManager,
    goal_client::GoalClient,
    goal_dispatcher::GoalDispatcher,
    params::BridgeExecParams,
    route_catalog::{RouteCatalog, RoutesParams},
    telem_client::TelemClient,
    telem_store::TelemetryStore,
    web::{self, AppState},
};
use comms_if::net::{zmq, NetParams};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params::load_from,
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Bridge between the robot's navigation stack and web clients.
#[derive(Debug, StructOpt)]
#[structopt(name = "bridge_exec")]
struct Opt {
    /// Software root containing the `params` directory. Defaults to the value of
    /// `NAV_BRIDGE_ROOT`, or the working directory if that is not set.
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,

    /// Minimum level of log messages, at least `info`.
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
#[tokio::main]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();
    let root = opt.root.unwrap_or_else(host::get_sw_root_or_cwd);

    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("bridge_exec", &root, "sessions").wrap_err("Failed to create the session")?;

    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Navigation Bridge Executable\n");
    info!("Software root: {:?}", root);
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params_dir = root.join("params");

    let exec_params: BridgeExecParams =
        load_from(&params_dir, "bridge_exec.toml").wrap_err("Could not load exec params")?;
    exec_params
        .validate()
        .wrap_err("Invalid exec params")?;
    let net_params: NetParams =
        load_from(&params_dir, "net.toml").wrap_err("Could not load net params")?;
    let routes_params: RoutesParams =
        load_from(&params_dir, "routes.toml").wrap_err("Could not load routes")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE STATE ----

    let catalog = Arc::new(RouteCatalog::from(routes_params));
    info!("Stored routes: {:?}", catalog.list_names());

    let store = Arc::new(TelemetryStore::new());

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let telem_client = TelemClient::new(&zmq_ctx, &net_params, store.clone())
        .wrap_err("Failed to initialise the TelemClient")?;
    info!("TelemClient initialised");

    let goal_client =
        GoalClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the GoalClient")?;
    info!("GoalClient initialised on {}", net_params.goal_endpoint);

    let dispatcher = Arc::new(GoalDispatcher::new(
        catalog.clone(),
        Arc::new(goal_client),
        &exec_params.goal_frame_id,
    ));

    let conns = ConnectionManager::new(store.clone(), exec_params.stream);

    // ---- START WEB SERVER ----

    let state = Arc::new(AppState {
        catalog,
        store,
        dispatcher,
        conns: conns.clone(),
        start_time: Instant::now(),
    });

    let static_dir = exec_params.static_dir.as_ref().map(|d| root.join(d));
    let app = web::router(state, static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(exec_params.http_bind)
        .await
        .wrap_err_with(|| format!("Failed to bind to {}", exec_params.http_bind))?;

    info!("Web server listening on http://{}", exec_params.http_bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(conns))
        .await
        .wrap_err("Web server error")?;

    // ---- SHUTDOWN ----

    telem_client.stop();

    info!("End of execution");

    Ok(())
}

/// Resolves when Ctrl-C is pressed, after closing all streaming connections.
///
/// WebSocket connections are not drained by the server's graceful shutdown, so they are closed
/// here before the server stops accepting requests.
async fn shutdown_signal(conns: ConnectionManager) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for Ctrl-C, shutting down: {}", e);
    }

    info!("Shutting down");
    conns.shutdown();
}
