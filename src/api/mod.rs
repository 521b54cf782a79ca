//! REST API module
//!
//! Provides HTTP REST API for programmatic access to the ledger.
//!
//! # Endpoints
//!
//! ## Ledger
//! - `GET /api/token` - Metadata, supply and mint policy
//! - `GET /api/holders` - Non-zero balances
//! - `GET /api/balances/{address}` - Balance of an account
//! - `GET /api/allowances/{owner}/{spender}` - Remaining allowance
//! - `GET /api/accounts/{address}/nonce` - Next nonce for an account
//! - `GET /api/receipts?limit=N` - Recent receipts
//!
//! ## Calls
//! - `POST /api/calls` - Submit a signed call
//!
//! ## Wallets
//! - `GET /api/wallets` - List wallets
//! - `POST /api/wallets` - Create wallet
//! - `POST /api/wallets/{address}/call` - Sign and submit with a held wallet
//!
//! ## WebSocket
//! - `GET /ws` - Live receipts (Connected, Receipt, Ping)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
