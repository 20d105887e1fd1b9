use actix_web::{error, web, HttpResponse};
use log::warn;

use super::handlers;
use super::schema::StatusResponse;

/// Configures the API routes
///
/// Paths are unprefixed because peers address each other's `/transactions`
/// directly.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(handlers::get_chain))
        .route("/chain", web::get().to(handlers::get_chain))
        .service(
            web::resource("/transactions")
                .route(web::get().to(handlers::get_transactions))
                .route(web::post().to(handlers::create_transaction))
                .route(web::put().to(handlers::replicate_transaction))
                .route(web::delete().to(handlers::clear_transactions)),
        )
        .route("/mine", web::get().to(handlers::mine))
        .route("/mine/start", web::get().to(handlers::start_mining))
        .route("/amount", web::get().to(handlers::get_amount))
        .route("/wallet", web::post().to(handlers::create_wallet))
        .route("/wallet/transaction", web::post().to(handlers::create_wallet_transaction));
}

// Undecodable bodies get the same status body as any other rejection
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Malformed request body: {}", err);
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(StatusResponse::fail())).into()
    })
}
