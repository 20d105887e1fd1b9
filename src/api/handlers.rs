use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};

use super::schema::{
    AmountQuery, AmountResponse, ChainResponse, PoolResponse, StatusResponse, WalletResponse,
    WalletTransactionRequest,
};
use crate::blockchain::{Address, TransactionRequest, Wallet};
use crate::node::{Node, NodeError};

/// Shared node state
pub type NodeData = web::Data<Node>;

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(node: NodeData) -> impl Responder {
    let blockchain = node.blockchain();
    let chains = blockchain.chain();

    HttpResponse::Ok().json(ChainResponse {
        length: chains.len(),
        chains,
        is_valid: blockchain.is_valid(),
    })
}

/// Get the transaction pool
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Pending transactions", body = PoolResponse)
    )
)]
pub async fn get_transactions(node: NodeData) -> impl Responder {
    let transactions = node.blockchain().transaction_pool();

    HttpResponse::Ok().json(PoolResponse {
        length: transactions.len(),
        transactions,
    })
}

/// Submit a signed transaction
///
/// Accepted transactions are replicated to known peers.
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction added to the pool", body = StatusResponse),
        (status = 400, description = "Missing field or invalid signature", body = StatusResponse)
    )
)]
pub async fn create_transaction(node: NodeData, request: web::Json<TransactionRequest>) -> impl Responder {
    match node.create_transaction(request.into_inner()) {
        Ok(_) => HttpResponse::Created().json(StatusResponse::success()),
        Err(err) => rejected(err),
    }
}

/// Accept a transaction replicated from a peer
#[utoipa::path(
    put,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Transaction added to the pool", body = StatusResponse),
        (status = 400, description = "Missing field or invalid signature", body = StatusResponse)
    )
)]
pub async fn replicate_transaction(node: NodeData, request: web::Json<TransactionRequest>) -> impl Responder {
    match node.add_transaction(&request) {
        Ok(_) => HttpResponse::Ok().json(StatusResponse::success()),
        Err(err) => rejected(err),
    }
}

/// Clear the transaction pool
#[utoipa::path(
    delete,
    path = "/transactions",
    responses(
        (status = 200, description = "Pool cleared", body = StatusResponse)
    )
)]
pub async fn clear_transactions(node: NodeData) -> impl Responder {
    node.clear_transaction_pool();
    HttpResponse::Ok().json(StatusResponse::success())
}

/// Mine one block from the pending transactions
#[utoipa::path(
    get,
    path = "/mine",
    responses(
        (status = 200, description = "Block mined", body = StatusResponse),
        (status = 400, description = "Nothing to mine", body = StatusResponse),
        (status = 500, description = "Mining failed", body = StatusResponse)
    )
)]
pub async fn mine(node: NodeData) -> impl Responder {
    match node.mine().await {
        Ok(true) => HttpResponse::Ok().json(StatusResponse::success()),
        Ok(false) => HttpResponse::BadRequest().json(StatusResponse::fail()),
        Err(err) => {
            error!("Mining failed: {}", err);
            HttpResponse::InternalServerError().json(StatusResponse::fail())
        }
    }
}

/// Start mining on a fixed interval
#[utoipa::path(
    get,
    path = "/mine/start",
    responses(
        (status = 200, description = "Periodic mining is running", body = StatusResponse)
    )
)]
pub async fn start_mining(node: NodeData) -> impl Responder {
    if node.start_mining() {
        info!("Periodic mining started");
    }
    HttpResponse::Ok().json(StatusResponse::success())
}

/// Get the balance of an address
#[utoipa::path(
    get,
    path = "/amount",
    params(AmountQuery),
    responses(
        (status = 200, description = "Net balance over the committed chain", body = AmountResponse)
    )
)]
pub async fn get_amount(node: NodeData, query: web::Query<AmountQuery>) -> impl Responder {
    let address = Address(query.into_inner().blockchain_address);
    let amount = node.blockchain().calculate_total_amount(&address);

    HttpResponse::Ok().json(AmountResponse { amount })
}

/// Create a new wallet
///
/// The private key is returned once and must be stored by the caller.
#[utoipa::path(
    post,
    path = "/wallet",
    responses(
        (status = 200, description = "Wallet created", body = WalletResponse),
        (status = 500, description = "Key generation failed")
    )
)]
pub async fn create_wallet() -> impl Responder {
    match Wallet::new() {
        Ok(wallet) => HttpResponse::Ok().json(WalletResponse::from(&wallet)),
        Err(err) => {
            error!("Failed to create wallet: {}", err);
            HttpResponse::InternalServerError().json(StatusResponse::fail())
        }
    }
}

/// Sign a transfer with the supplied keys and submit it
#[utoipa::path(
    post,
    path = "/wallet/transaction",
    request_body = WalletTransactionRequest,
    responses(
        (status = 201, description = "Transaction signed and added to the pool", body = StatusResponse),
        (status = 400, description = "Missing field, key mismatch or rejected transaction", body = StatusResponse)
    )
)]
pub async fn create_wallet_transaction(
    node: NodeData,
    request: web::Json<WalletTransactionRequest>,
) -> impl Responder {
    let (wallet, transaction) = match request.validate() {
        Ok(parts) => parts,
        Err(err) => {
            warn!("Wallet transaction rejected: {}", err);
            return HttpResponse::BadRequest().json(StatusResponse {
                message: err.to_string(),
            });
        }
    };

    let signature = match transaction.sign(&wallet) {
        Ok(signature) => signature,
        Err(err) => {
            error!("Failed to sign transaction: {}", err);
            return HttpResponse::InternalServerError().json(StatusResponse::fail());
        }
    };

    let signed = TransactionRequest::signed(&transaction, wallet.public_key(), &signature);
    match node.create_transaction(signed) {
        Ok(_) => HttpResponse::Created().json(StatusResponse::success()),
        Err(err) => rejected(err),
    }
}

fn rejected(err: NodeError) -> HttpResponse {
    warn!("Transaction rejected: {}", err);
    HttpResponse::BadRequest().json(StatusResponse::fail())
}
