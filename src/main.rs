use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{HeaderName, Method};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use scribe_gateway::{
    admission::ApiKey,
    deploy::{self, ContainerCli, ContainerFunctionHost, TaskOutcome},
    routes,
    state::AppState,
    GatewayConfig,
};

/// Scribe Gateway - admission gateway and deploy pipeline for a transcription function
#[derive(Parser, Debug)]
#[command(name = "scribe-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the admission gateway
    Serve,

    /// Run the deploy pipeline: fingerprint, conditional build/publish, function update
    Deploy {
        /// Container CLI to drive (docker-compatible)
        #[arg(long = "container-cli", default_value = "docker")]
        container_cli: String,

        /// Name of the serving container updated to the new image
        #[arg(long = "function-container", default_value = "scribe-function")]
        function_container: String,
    },

    /// Generate a fresh API key for this deployment
    Keygen {
        /// Identifier recorded next to the key
        #[arg(long = "id", default_value = "default")]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // Configuration validation runs inside the loaders; nothing below starts on a
    // config error.
    let config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        GatewayConfig::from_file(config_path)?
    } else {
        GatewayConfig::from_env()?
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Deploy {
            container_cli,
            function_container,
        } => run_deploy(config, container_cli, function_container).await,
        Commands::Keygen { id } => keygen(&config, id),
    }
}

async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    let address = config.address();
    let tls_config = config.tls.clone();
    let cors_origins = config.cors_allowed_origins.clone();
    let gateway_enabled = config.gateway_enabled;

    if gateway_enabled && config.api_keys.is_empty() {
        return Err(anyhow!(
            "gateway is enabled but no api keys are configured; run `scribe-gateway keygen` \
             and add the key to the configuration"
        ));
    }
    if !gateway_enabled {
        info!("gateway disabled: serving health route only, no transcription front door");
    }

    let app_state = Arc::new(AppState::new(config));
    let app = routes::build_router(app_state);

    // Configure CORS
    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    HeaderName::from_static("x-api-key"),
                ])
                .allow_credentials(false)
        } else {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    HeaderName::from_static("x-api-key"),
                ])
                .allow_credentials(true)
        }
    } else {
        // No CORS configured: same-origin only.
        info!("CORS not configured, defaulting to same-origin only");
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                http::header::CONTENT_TYPE,
                HeaderName::from_static("x-api-key"),
            ])
            .allow_credentials(false)
    };

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = app.layer(cors_layer).layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    if let Some(tls) = tls_config {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        info!("Gateway listening on https://{socket_addr} (TLS enabled)");
        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        info!("Gateway listening on http://{socket_addr}");
        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn run_deploy(
    config: GatewayConfig,
    container_cli: String,
    function_container: String,
) -> anyhow::Result<()> {
    let cli = ContainerCli::new(container_cli);
    let host = ContainerFunctionHost::new(cli.clone(), function_container);

    let reports = deploy::run_deploy(
        config,
        Arc::new(cli.clone()),
        Arc::new(cli),
        Arc::new(host),
    )
    .await?;

    for report in &reports {
        match &report.outcome {
            TaskOutcome::Completed => {
                println!("{:<16} completed in {}ms", report.id, report.duration_ms);
            }
            TaskOutcome::Skipped { reason } => {
                println!("{:<16} skipped ({reason})", report.id);
            }
        }
    }
    Ok(())
}

fn keygen(config: &GatewayConfig, id: String) -> anyhow::Result<()> {
    let key = ApiKey::generate(id, config.active_plan.clone());

    // The secret is emitted exactly once, here, on stdout. It is never logged.
    println!("api key id:     {}", key.id);
    println!("bound to plan:  {}", config.active_plan);
    println!("secret (sensitive, store it now; it will not be shown again):");
    println!("{}", key.expose_secret());
    Ok(())
}
