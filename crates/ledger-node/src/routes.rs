use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger_core::mine::find_proof_parallel;
use ledger_core::pow::find_proof;
use ledger_core::{Block, PeerChain, Resolution, Sealed, Transaction, Wallet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct MineParams {
    /// Address credited with the mining reward.
    pub miner: Option<String>,
}

#[derive(Deserialize)]
pub struct TxIn {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Deserialize)]
pub struct NodesIn {
    pub nodes: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/blocks", get(get_blocks).post(create_block))
        .route("/api/blocks/{index}", get(get_block_by_index))
        .route("/api/mine", post(mine_block))
        .route("/api/proof", get(get_proof))
        .route("/api/previous-hash", get(get_previous_hash))
        .route("/api/timestamp", get(get_timestamp))
        .route("/api/length", get(get_length))
        .route("/api/full-chain", get(get_full_chain))
        .route("/api/valid", get(get_valid))
        .route("/api/transactions/new", post(new_transaction))
        .route("/api/transactions/pending", get(get_pending))
        .route("/api/wallet", post(create_wallet))
        .route("/api/nodes/register", post(register_nodes))
        .route("/api/nodes/resolve", get(resolve))
        .route("/api/balance/{address}", get(get_balance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_blocks(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.ledger.chain())
}

/// Proof search is CPU-bound, so it runs off the async workers.
async fn mine(state: AppState, miner: Option<String>) -> ApiResult<Block> {
    let sealed: Sealed = tokio::task::spawn_blocking(move || {
        let reward_to = miner.as_deref();
        if state.parallel_pow {
            state
                .ledger
                .mine_with(reward_to, |last| Some(find_proof_parallel(last)))
        } else {
            state.ledger.mine(reward_to)
        }
    })
    .await??;
    Ok(sealed.block)
}

async fn create_block(
    State(state): State<AppState>,
    Query(params): Query<MineParams>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let block = mine(state, params.miner).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Block mined successfully", "block": block })),
    ))
}

async fn mine_block(
    State(state): State<AppState>,
    Query(params): Query<MineParams>,
) -> ApiResult<Json<Value>> {
    let block = mine(state, params.miner).await?;
    Ok(Json(
        json!({ "message": "Congratulations! You just mined a block", "block": block }),
    ))
}

async fn get_proof(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let last_proof = state.ledger.latest_block().proof;
    let proof = tokio::task::spawn_blocking(move || find_proof(last_proof)).await?;
    Ok(Json(json!({ "proof": proof })))
}

async fn get_previous_hash(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "previousHash": state.ledger.previous_hash() }))
}

async fn get_block_by_index(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> ApiResult<Json<Block>> {
    let index: u64 = index
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid index".into()))?;
    Ok(Json(state.ledger.block_at(index)?))
}

async fn get_timestamp(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "timestamp": state.ledger.latest_timestamp() }))
}

async fn get_length(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "length": state.ledger.chain_length() }))
}

async fn get_full_chain(State(state): State<AppState>) -> Json<PeerChain> {
    let chain = state.ledger.chain();
    Json(PeerChain {
        length: chain.len() as u64,
        chain,
    })
}

async fn get_valid(State(state): State<AppState>) -> Json<Value> {
    let chain = state.ledger.chain();
    match state.ledger.check(&chain) {
        Ok(()) => Json(json!({ "valid": true })),
        Err(fault) => Json(json!({ "valid": false, "reason": fault.to_string() })),
    }
}

async fn new_transaction(
    State(state): State<AppState>,
    body: Result<Json<TxIn>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(tx) = body?;
    let index = state.ledger.admit(Transaction::new(
        tx.sender,
        tx.receiver,
        tx.amount,
        tx.signature,
    ))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Transaction will be added to Block {index}") })),
    ))
}

async fn get_pending(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.ledger.pending())
}

async fn create_wallet() -> (StatusCode, Json<Value>) {
    let wallet = Wallet::generate();
    (
        StatusCode::CREATED,
        Json(json!({
            "private_key": wallet.secret_hex(),
            "public_key": wallet.address(),
            "address": wallet.address(),
        })),
    )
}

async fn register_nodes(
    State(state): State<AppState>,
    body: Result<Json<NodesIn>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(input) = body.map_err(|_| ApiError::BadRequest("Invalid input".into()))?;
    if input.nodes.is_empty() {
        return Err(ApiError::BadRequest(
            "Please supply a valid list of nodes".into(),
        ));
    }
    state.ledger.register_nodes(input.nodes.as_slice())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New nodes have been added",
            "nodes": state.ledger.nodes(),
        })),
    ))
}

async fn resolve(State(state): State<AppState>) -> Json<Value> {
    let resolution = state.ledger.resolve_conflicts(state.peers.as_ref()).await;
    let chain = state.ledger.chain();
    match resolution {
        Resolution::Replaced => Json(json!({
            "message": "Our chain was replaced",
            "new_chain": chain,
        })),
        Resolution::Authoritative => Json(json!({
            "message": "Our chain is authoritative",
            "chain": chain,
        })),
    }
}

async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<Value> {
    let balance = state.ledger.balance(&address);
    Json(json!({ "address": address, "balance": balance }))
}
