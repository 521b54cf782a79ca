//! Token Ledger CLI Application
//!
//! A command-line interface for deploying and driving a fungible-token ledger.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use token_ledger::api::{create_router, ApiState};
use token_ledger::cli::{self, AppState, InitOptions};
use token_ledger::token::LedgerCall;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(version)]
#[command(about = "A fungible-token ledger with signed, sequenced calls", long_about = None)]
struct Cli {
    /// Data directory for ledger state and wallets
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a new ledger
    Init {
        /// Token name
        #[arg(long)]
        name: Option<String>,

        /// Token symbol
        #[arg(long)]
        symbol: Option<String>,

        /// Number of decimals
        #[arg(long)]
        decimals: Option<u8>,

        /// Initial supply in whole tokens (e.g. 100000)
        #[arg(long)]
        supply: Option<String>,

        /// Allow any account to mint
        #[arg(long)]
        open_mint: bool,

        /// Deployer wallet address (a new wallet is created if omitted)
        #[arg(long)]
        deployer: Option<String>,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Display token information
    Info,

    /// Show the balance of an account
    Balance {
        /// Account address
        address: String,
    },

    /// Show the remaining allowance of a spender
    Allowance {
        /// Owner address
        owner: String,

        /// Spender address
        spender: String,
    },

    /// Transfer tokens
    Transfer {
        /// Sender's wallet address
        #[arg(short, long)]
        from: String,

        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Set the allowance of a spender
    Approve {
        /// Owner's wallet address
        #[arg(short, long)]
        from: String,

        /// Spender's address
        #[arg(short, long)]
        spender: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Raise the allowance of a spender
    IncreaseAllowance {
        /// Owner's wallet address
        #[arg(short, long)]
        from: String,

        /// Spender's address
        #[arg(short, long)]
        spender: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Lower the allowance of a spender
    DecreaseAllowance {
        /// Owner's wallet address
        #[arg(short, long)]
        from: String,

        /// Spender's address
        #[arg(short, long)]
        spender: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Spend an allowance
    TransferFrom {
        /// Spender's wallet address
        #[arg(short, long)]
        from: String,

        /// Address whose tokens are moved
        #[arg(short, long)]
        owner: String,

        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Create new tokens
    Mint {
        /// Minter's wallet address
        #[arg(short, long)]
        from: String,

        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Destroy tokens from your own balance
    Burn {
        /// Holder's wallet address
        #[arg(short, long)]
        from: String,

        /// Amount in whole tokens
        #[arg(short, long)]
        amount: String,
    },

    /// Show recent calls
    History {
        /// Number of calls to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Export ledger state to file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import ledger state from file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List backups, or restore one as the current state
    Restore {
        /// Backup index (0 is the most recent); lists backups if omitted
        #[arg(short, long)]
        backup: Option<usize>,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    New {
        /// Optional label for the wallet
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List all wallets
    List,
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle init command separately (doesn't need full state)
    if let Commands::Init {
        name,
        symbol,
        decimals,
        supply,
        open_mint,
        deployer,
    } = cli.command
    {
        let options = InitOptions {
            name,
            symbol,
            decimals,
            supply,
            open_mint,
            deployer,
        };
        return cli::cmd_init(&cli.data_dir, options);
    }

    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Api { action } => {
            run_api_command(&action, state)?;
        }

        Commands::Wallet { action } => match action {
            WalletCommands::New { label } => {
                cli::cmd_wallet_new(&mut state, label.as_deref())?;
            }
            WalletCommands::List => {
                cli::cmd_wallet_list(&state)?;
            }
        },

        Commands::Info => {
            cli::cmd_info(&state)?;
        }

        Commands::Balance { address } => {
            cli::cmd_balance(&state, &address)?;
        }

        Commands::Allowance { owner, spender } => {
            cli::cmd_allowance(&state, &owner, &spender)?;
        }

        Commands::Transfer { from, to, amount } => {
            let call = LedgerCall::Transfer {
                to: cli::parse_address(&to)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::Approve {
            from,
            spender,
            amount,
        } => {
            let call = LedgerCall::Approve {
                spender: cli::parse_address(&spender)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::IncreaseAllowance {
            from,
            spender,
            amount,
        } => {
            let call = LedgerCall::IncreaseAllowance {
                spender: cli::parse_address(&spender)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::DecreaseAllowance {
            from,
            spender,
            amount,
        } => {
            let call = LedgerCall::DecreaseAllowance {
                spender: cli::parse_address(&spender)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::TransferFrom {
            from,
            owner,
            to,
            amount,
        } => {
            let call = LedgerCall::TransferFrom {
                owner: cli::parse_address(&owner)?,
                to: cli::parse_address(&to)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::Mint { from, to, amount } => {
            let call = LedgerCall::Mint {
                to: cli::parse_address(&to)?,
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::Burn { from, amount } => {
            let call = LedgerCall::Burn {
                amount: state.parse_amount(&amount)?,
            };
            cli::cmd_call(&mut state, &from, call)?;
        }

        Commands::History { count } => {
            cli::cmd_history(&state, count)?;
        }

        Commands::Export { output } => {
            cli::cmd_export(&state, &output)?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&mut state, &input)?;
        }

        Commands::Restore { backup } => {
            cli::cmd_restore(&mut state, backup)?;
        }
    }

    Ok(())
}

fn run_api_command(action: &ApiCommands, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match action {
            ApiCommands::Start { port } => {
                let AppState {
                    sequencer,
                    storage,
                    wallet_manager,
                    ..
                } = state;
                let api_state = ApiState::new(sequencer, storage, wallet_manager);

                // Clone state for shutdown handler
                let shutdown_state = api_state.clone();

                let app = create_router(api_state);

                let addr = format!("0.0.0.0:{}", port);
                println!("🚀 REST API server starting on http://localhost:{}", port);

                println!();
                println!("📖 Available endpoints:");
                println!("   GET  /health                             - Health check");
                println!("   GET  /ws                                 - WebSocket receipts");
                println!("   GET  /api/token                          - Token info");
                println!("   GET  /api/holders                        - Token holders");
                println!("   GET  /api/balances/{{addr}}                - Balance");
                println!("   GET  /api/allowances/{{owner}}/{{spender}}   - Allowance");
                println!("   GET  /api/accounts/{{addr}}/nonce          - Next nonce");
                println!("   GET  /api/receipts?limit=N               - Recent receipts");
                println!("   POST /api/calls                          - Submit signed call");
                println!("   GET  /api/wallets                        - List wallets");
                println!("   POST /api/wallets                        - Create wallet");
                println!("   POST /api/wallets/{{addr}}/call            - Sign and submit");
                println!();

                // Handle Ctrl+C with graceful shutdown
                tokio::spawn(async move {
                    tokio::signal::ctrl_c().await.ok();
                    println!("\n📴 Shutting down API server...");

                    println!("💾 Saving data...");
                    let sequencer = shutdown_state.sequencer.read().await;
                    match shutdown_state.storage.save(&sequencer) {
                        Ok(()) => println!("✅ Data saved successfully!"),
                        Err(e) => log::error!("Failed to save ledger state: {}", e),
                    }
                    std::process::exit(0);
                });

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
