use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::path::PathBuf;
use std::sync::Arc;

mod api;
mod blockchain;
mod config;
mod network;
mod node;

use blockchain::{Blockchain, Wallet};
use network::{resolve_host, PeerClient, PeerSource, PortScanner, StaticPeers};
use node::Node;

#[derive(Parser, Debug)]
#[command(name = "pow-ledger", about = "Proof-of-work ledger node")]
struct Cli {
    /// Port to listen on; overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_transactions,
        api::handlers::create_transaction,
        api::handlers::replicate_transaction,
        api::handlers::clear_transactions,
        api::handlers::mine,
        api::handlers::start_mining,
        api::handlers::get_amount,
        api::handlers::create_wallet,
        api::handlers::create_wallet_transaction
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::TransactionRequest,
            api::schema::ChainResponse,
            api::schema::PoolResponse,
            api::schema::StatusResponse,
            api::schema::AmountResponse,
            api::schema::WalletResponse,
            api::schema::WalletTransactionRequest
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger endpoints")
    ),
    info(
        title = "Proof-of-Work Ledger API",
        version = "0.1.0",
        description = "Wallets, signed transfers, mining and balances",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

// The miner identity lives only for this process
fn create_miner_wallet() -> anyhow::Result<Wallet> {
    let wallet = Wallet::new().context("failed to generate miner wallet")?;

    info!("Miner private key: {}", wallet.private_key_hex());
    info!("Miner public key: {}", wallet.public_key().to_hex());
    info!("Miner blockchain address: {}", wallet.address());

    Ok(wallet)
}

fn peer_source(network: &config::NetworkConfig, blockchain: &Blockchain) -> Arc<dyn PeerSource> {
    if !network.static_peers.is_empty() {
        info!("Using {} static peers", network.static_peers.len());
        return Arc::new(StaticPeers::new(network.static_peers.clone()));
    }

    let host = resolve_host(&network.host);
    Arc::new(
        PortScanner::new(host, blockchain.port(), network.peer_ip_offsets(), network.peer_ports())
            .with_timeout(network.probe_timeout()),
    )
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let port = cli.port.unwrap_or(config.network.port);

    let miner = create_miner_wallet()?;
    let blockchain = Blockchain::with_params(miner.address().clone(), port, config.mining.params())?;
    let genesis = blockchain.last_block()?;
    info!("Genesis block {} created, difficulty {}", genesis.hash_hex()?, blockchain.difficulty());

    let peers = PeerClient::new(config.network.propagation_timeout())?;
    let node = Node::new(blockchain, peers, config.mining.interval());

    node.spawn_neighbour_sync(
        peer_source(&config.network, node.blockchain()),
        config.network.neighbour_sync_interval(),
    );
    if config.mining.auto_start {
        node.start_mining();
    }

    let data = web::Data::new(node.clone());

    info!("Starting HTTP server at http://0.0.0.0:{}", port);

    let result = HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(data.clone())
            .configure(api::configure_routes)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    node.shutdown();
    if let Err(err) = &result {
        warn!("HTTP server stopped with error: {}", err);
    }
    result.context("HTTP server failed")
}
