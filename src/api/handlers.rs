//! REST API handlers for ledger operations

use crate::api::websocket::{WsBroadcaster, WsEvent};
use crate::core::{Outcome, Receipt, Sequencer, SequencerError};
use crate::storage::Storage;
use crate::token::{format_units, Address, CallError, LedgerCall, MintPolicy, SignedCall};
use crate::wallet::{WalletError, WalletManager};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Receipts returned by `/api/receipts` when no limit is given
const DEFAULT_RECEIPT_LIMIT: usize = 20;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub sequencer: Arc<RwLock<Sequencer>>,
    pub storage: Arc<Storage>,
    pub wallet_manager: Arc<RwLock<WalletManager>>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

impl ApiState {
    pub fn new(sequencer: Sequencer, storage: Storage, wallet_manager: WalletManager) -> Self {
        Self {
            sequencer: Arc::new(RwLock::new(sequencer)),
            storage: Arc::new(storage),
            wallet_manager: Arc::new(RwLock::new(wallet_manager)),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,
    pub total_supply_formatted: String,
    pub owner: Address,
    pub mint_policy: MintPolicy,
    pub holder_count: usize,
    pub deployed_at: String,
    pub height: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: String,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct AllowanceResponse {
    pub owner: Address,
    pub spender: Address,
    pub allowance: String,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub address: Address,
    pub nonce: u64,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub address: Address,
    pub public_key: String,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    /// Machine-readable reason for ledger rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Receipt of a sequenced but reverted call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.into(),
            kind: None,
            receipt: None,
        }),
    )
}

fn parse_address(value: &str) -> Result<Address, (StatusCode, Json<ApiError>)> {
    value.parse().map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid address {}: {}", value, e),
        )
    })
}

fn body_error(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn sequencer_error(e: SequencerError) -> (StatusCode, Json<ApiError>) {
    let status = match &e {
        SequencerError::Call(CallError::Serialization(_)) => StatusCode::BAD_REQUEST,
        SequencerError::Call(_) => StatusCode::UNAUTHORIZED,
        SequencerError::NonceMismatch { .. } => StatusCode::BAD_REQUEST,
        SequencerError::Deploy(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

fn wallet_error(e: WalletError) -> (StatusCode, Json<ApiError>) {
    let status = match &e {
        WalletError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateWalletRequest {
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct ReceiptsQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Read Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/token - Token metadata and supply
pub async fn get_token_info(State(state): State<ApiState>) -> Json<TokenInfo> {
    let sequencer = state.sequencer.read().await;
    let ledger = sequencer.ledger();

    Json(TokenInfo {
        address: ledger.address(),
        name: ledger.name().to_string(),
        symbol: ledger.symbol().to_string(),
        decimals: ledger.decimals(),
        total_supply: ledger.total_supply().to_string(),
        total_supply_formatted: format_units(ledger.total_supply(), ledger.decimals()),
        owner: ledger.owner(),
        mint_policy: ledger.mint_policy(),
        holder_count: ledger.holder_count(),
        deployed_at: ledger.deployed_at().to_rfc3339(),
        height: sequencer.height(),
    })
}

/// GET /api/holders - Non-zero balances, largest first
pub async fn get_holders(State(state): State<ApiState>) -> Json<Vec<BalanceResponse>> {
    let sequencer = state.sequencer.read().await;
    let ledger = sequencer.ledger();

    let holders = ledger
        .holders()
        .into_iter()
        .map(|(address, balance)| BalanceResponse {
            address,
            balance: balance.to_string(),
            formatted: format_units(balance, ledger.decimals()),
        })
        .collect();

    Json(holders)
}

/// GET /api/balances/{address}
pub async fn get_balance(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<BalanceResponse> {
    let address = parse_address(&address)?;
    let sequencer = state.sequencer.read().await;
    let ledger = sequencer.ledger();
    let balance = ledger.balance_of(&address);

    Ok(Json(BalanceResponse {
        address,
        balance: balance.to_string(),
        formatted: format_units(balance, ledger.decimals()),
    }))
}

/// GET /api/allowances/{owner}/{spender}
pub async fn get_allowance(
    State(state): State<ApiState>,
    Path((owner, spender)): Path<(String, String)>,
) -> ApiResult<AllowanceResponse> {
    let owner = parse_address(&owner)?;
    let spender = parse_address(&spender)?;
    let sequencer = state.sequencer.read().await;
    let ledger = sequencer.ledger();
    let allowance = ledger.allowance(&owner, &spender);

    Ok(Json(AllowanceResponse {
        owner,
        spender,
        allowance: allowance.to_string(),
        formatted: format_units(allowance, ledger.decimals()),
    }))
}

/// GET /api/accounts/{address}/nonce - Next nonce to sign with
pub async fn get_nonce(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> ApiResult<NonceResponse> {
    let address = parse_address(&address)?;
    let sequencer = state.sequencer.read().await;

    Ok(Json(NonceResponse {
        address,
        nonce: sequencer.nonce(&address),
    }))
}

/// GET /api/receipts?limit=N - Recent receipts, oldest first
pub async fn get_receipts(
    State(state): State<ApiState>,
    Query(query): Query<ReceiptsQuery>,
) -> Json<Vec<Receipt>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECEIPT_LIMIT);
    let sequencer = state.sequencer.read().await;

    Json(sequencer.receipts(limit).into_iter().cloned().collect())
}

// ============================================================================
// Write Handlers
// ============================================================================

/// Map a sequenced receipt to a response
fn finish(receipt: Receipt) -> ApiResult<Receipt> {
    match &receipt.outcome {
        Outcome::Committed { .. } => Ok(Json(receipt)),
        Outcome::Reverted { error } => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: error.to_string(),
                kind: Some(error.kind().to_string()),
                receipt: Some(receipt.clone()),
            }),
        )),
    }
}

/// Persist and announce a receipt; called with the sequencer write lock held
/// so the feed sees receipts in `seq` order
fn record(state: &ApiState, sequencer: &Sequencer, receipt: &Receipt) {
    if let Err(e) = state.storage.save(sequencer) {
        log::error!("Failed to save ledger state: {}", e);
    }
    state.ws_broadcaster.broadcast(WsEvent::Receipt {
        receipt: receipt.clone(),
    });
}

/// POST /api/calls - Submit a call signed by the client
pub async fn submit_call(
    State(state): State<ApiState>,
    payload: Result<Json<SignedCall>, JsonRejection>,
) -> ApiResult<Receipt> {
    let Json(signed) = payload.map_err(body_error)?;
    let receipt = {
        let mut sequencer = state.sequencer.write().await;
        let receipt = sequencer.submit(&signed).map_err(sequencer_error)?;
        record(&state, &sequencer, &receipt);
        receipt
    };

    finish(receipt)
}

/// POST /api/wallets/{address}/call - Sign with a server-held wallet and submit
pub async fn call_with_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    payload: Result<Json<LedgerCall>, JsonRejection>,
) -> ApiResult<Receipt> {
    let Json(call) = payload.map_err(body_error)?;
    let address = parse_address(&address)?;
    let wallet = {
        let manager = state.wallet_manager.read().await;
        manager.load_wallet(&address).map_err(wallet_error)?
    };

    let receipt = {
        let mut sequencer = state.sequencer.write().await;
        let nonce = sequencer.nonce(&wallet.address());
        let signed = wallet
            .sign_call(sequencer.ledger().address(), nonce, call)
            .map_err(wallet_error)?;
        let receipt = sequencer.submit(&signed).map_err(sequencer_error)?;
        record(&state, &sequencer, &receipt);
        receipt
    };

    finish(receipt)
}

// ============================================================================
// Wallet Handlers
// ============================================================================

/// POST /api/wallets - Create a server-held wallet
pub async fn create_wallet(
    State(state): State<ApiState>,
    payload: Result<Json<CreateWalletRequest>, JsonRejection>,
) -> ApiResult<WalletResponse> {
    let Json(req) = payload.map_err(body_error)?;
    let manager = state.wallet_manager.read().await;

    match manager.create_wallet(req.label.as_deref()) {
        Ok(wallet) => Ok(Json(WalletResponse {
            address: wallet.address(),
            public_key: wallet.public_key(),
            label: req.label,
        })),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to create wallet: {}", e),
        )),
    }
}

/// GET /api/wallets - List server-held wallets
pub async fn list_wallets(State(state): State<ApiState>) -> ApiResult<Vec<WalletResponse>> {
    let manager = state.wallet_manager.read().await;

    match manager.list_wallets() {
        Ok(infos) => Ok(Json(
            infos
                .into_iter()
                .map(|info| WalletResponse {
                    address: info.address,
                    public_key: info.public_key,
                    label: info.label,
                })
                .collect(),
        )),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list wallets: {}", e),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::storage::StorageConfig;
    use crate::token::TokenError;
    use crate::wallet::Wallet;
    use tempfile::TempDir;

    /// API state backed by a temp dir, with the owner wallet held server-side
    pub(crate) fn test_state() -> (ApiState, Wallet, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let wallet_manager = WalletManager::new(&temp_dir.path().join("wallets")).unwrap();
        let owner = wallet_manager.create_wallet(Some("owner")).unwrap();
        let sequencer = Sequencer::deploy(&LedgerConfig::default(), owner.address()).unwrap();

        (
            ApiState::new(sequencer, storage, wallet_manager),
            owner,
            temp_dir,
        )
    }

    async fn signed(state: &ApiState, wallet: &Wallet, call: LedgerCall) -> SignedCall {
        let sequencer = state.sequencer.read().await;
        wallet
            .sign_call(
                sequencer.ledger().address(),
                sequencer.nonce(&wallet.address()),
                call,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_token_info() {
        let (state, owner, _dir) = test_state();

        let Json(info) = get_token_info(State(state)).await;
        assert_eq!(info.name, "Testing Token");
        assert_eq!(info.symbol, "TT");
        assert_eq!(info.decimals, 6);
        assert_eq!(info.total_supply, "100000000000");
        assert_eq!(info.total_supply_formatted, "100000");
        assert_eq!(info.owner, owner.address());
        assert_eq!(info.holder_count, 1);
        assert_eq!(info.height, 1);
    }

    #[tokio::test]
    async fn test_balance_and_bad_address() {
        let (state, owner, _dir) = test_state();

        let Json(balance) = get_balance(State(state.clone()), Path(owner.address().to_string()))
            .await
            .unwrap();
        assert_eq!(balance.balance, "100000000000");

        let err = get_balance(State(state), Path("0x1234".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_signed_transfer() {
        let (state, owner, dir) = test_state();
        let bob = Address::derive(b"bob");

        let call = signed(
            &state,
            &owner,
            LedgerCall::Transfer {
                to: bob,
                amount: 100_000_000,
            },
        )
        .await;
        let Json(receipt) = submit_call(State(state.clone()), Ok(Json(call))).await.unwrap();
        assert!(receipt.is_committed());

        let Json(balance) = get_balance(State(state.clone()), Path(bob.to_string()))
            .await
            .unwrap();
        assert_eq!(balance.formatted, "100");

        let Json(nonce) = get_nonce(State(state.clone()), Path(owner.address().to_string()))
            .await
            .unwrap();
        assert_eq!(nonce.nonce, 1);

        // persisted after the write
        assert!(dir.path().join("ledger.json").exists());
    }

    #[tokio::test]
    async fn test_replay_is_bad_request() {
        let (state, owner, _dir) = test_state();
        let call = signed(&state, &owner, LedgerCall::Burn { amount: 1 }).await;

        submit_call(State(state.clone()), Ok(Json(call.clone())))
            .await
            .unwrap();
        let err = submit_call(State(state), Ok(Json(call))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tampered_call_is_unauthorized() {
        let (state, owner, _dir) = test_state();
        let mut call = signed(&state, &owner, LedgerCall::Burn { amount: 1 }).await;
        call.call = LedgerCall::Burn { amount: 1_000 };

        let err = submit_call(State(state), Ok(Json(call))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_reverted_call_is_unprocessable() {
        let (state, _owner, _dir) = test_state();
        let stranger = Wallet::new();
        let call = signed(
            &state,
            &stranger,
            LedgerCall::Transfer {
                to: Address::derive(b"x"),
                amount: 100_000_000,
            },
        )
        .await;

        let (status, Json(body)) = submit_call(State(state.clone()), Ok(Json(call)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind.as_deref(), Some("insufficient_balance"));
        assert!(matches!(
            body.receipt.and_then(|r| r.error().cloned()),
            Some(TokenError::InsufficientBalance { .. })
        ));

        // nonce consumed, receipt journaled
        assert_eq!(state.sequencer.read().await.nonce(&stranger.address()), 1);
        let Json(receipts) = get_receipts(State(state), Query(ReceiptsQuery { limit: None })).await;
        assert_eq!(receipts.len(), 2);
    }

    #[tokio::test]
    async fn test_wallet_call_flow() {
        let (state, owner, _dir) = test_state();

        let Json(spender) = create_wallet(
            State(state.clone()),
            Ok(Json(CreateWalletRequest {
                label: Some("spender".to_string()),
            })),
        )
        .await
        .unwrap();
        let recipient = Address::derive(b"recipient");

        call_with_wallet(
            State(state.clone()),
            Path(owner.address().to_string()),
            Ok(Json(LedgerCall::Approve {
                spender: spender.address,
                amount: 100_000_000,
            })),
        )
        .await
        .unwrap();

        let Json(receipt) = call_with_wallet(
            State(state.clone()),
            Path(spender.address.to_string()),
            Ok(Json(LedgerCall::TransferFrom {
                owner: owner.address(),
                to: recipient,
                amount: 100_000_000,
            })),
        )
        .await
        .unwrap();
        assert!(receipt.is_committed());

        let Json(allowance) = get_allowance(
            State(state.clone()),
            Path((owner.address().to_string(), spender.address.to_string())),
        )
        .await
        .unwrap();
        assert_eq!(allowance.allowance, "0");

        let Json(holders) = get_holders(State(state.clone())).await;
        assert_eq!(holders.len(), 2);

        let Json(wallets) = list_wallets(State(state)).await.unwrap();
        assert_eq!(wallets.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_wallet_is_not_found() {
        let (state, _owner, _dir) = test_state();

        let err = call_with_wallet(
            State(state),
            Path(Address::derive(b"nobody").to_string()),
            Ok(Json(LedgerCall::Burn { amount: 1 })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (state, owner, _dir) = test_state();

        let negative = Json::<SignedCall>::from_bytes(
            br#"{"call":{"op":"burn","amount":"-5"},"nonce":0,"public_key":"","signature":""}"#,
        );
        let (status, Json(body)) = submit_call(State(state.clone()), negative)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.starts_with("Invalid request body"));

        let unknown_op = Json::<LedgerCall>::from_bytes(br#"{"op":"steal","amount":"5"}"#);
        let err = call_with_wallet(
            State(state.clone()),
            Path(owner.address().to_string()),
            unknown_op,
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let not_json = Json::<CreateWalletRequest>::from_bytes(b"label=x");
        let err = create_wallet(State(state.clone()), not_json)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        // nothing was sequenced
        let sequencer = state.sequencer.read().await;
        assert_eq!(sequencer.height(), 1);
        assert_eq!(sequencer.nonce(&owner.address()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_feed_follows_sequence_order() {
        let (state, owner, _dir) = test_state();
        let mut rx = state.ws_broadcaster.subscribe();
        let recipient = Address::derive(b"recipient");

        // independent senders, each with its own nonce 0
        let mut calls = vec![signed(&state, &owner, LedgerCall::Burn { amount: 1 }).await];
        for _ in 0..7 {
            let sender = Wallet::new();
            calls.push(
                signed(
                    &state,
                    &sender,
                    LedgerCall::Transfer {
                        to: recipient,
                        amount: 1,
                    },
                )
                .await,
            );
        }

        let tasks: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let state = state.clone();
                tokio::spawn(async move { submit_call(State(state), Ok(Json(call))).await })
            })
            .collect();
        for task in tasks {
            let _ = task.await.unwrap();
        }

        let mut seqs = Vec::new();
        for _ in 0..8 {
            match rx.recv().await.unwrap() {
                WsEvent::Receipt { receipt } => seqs.push(receipt.seq),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(seqs, (1..9).collect::<Vec<u64>>());
    }
}
