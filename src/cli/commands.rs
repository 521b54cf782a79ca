//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface.

use crate::config::{LedgerConfig, CONFIG_FILE};
use crate::core::{Outcome, Receipt, Sequencer};
use crate::storage::{Storage, StorageConfig};
use crate::token::{format_units, parse_units, Address, LedgerCall, LedgerEvent, MintPolicy};
use crate::wallet::WalletManager;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub sequencer: Sequencer,
    pub storage: Storage,
    pub wallet_manager: WalletManager,
    pub data_dir: PathBuf,
}

/// Options for `ledger init`; unset fields come from `config.json`
#[derive(Debug, Default, Clone)]
pub struct InitOptions {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    /// Whole tokens, decimal notation
    pub supply: Option<String>,
    pub open_mint: bool,
    pub deployer: Option<String>,
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    let storage_config = StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    Ok(Storage::new(storage_config)?)
}

impl AppState {
    /// Load the ledger in `data_dir`, deploying one with default settings if none exists
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;
        let wallet_manager = WalletManager::new(&data_dir.join("wallets"))?;

        let sequencer = if storage.exists() {
            log::debug!("Loading ledger from {:?}", data_dir);
            storage.load()?
        } else {
            println!("🆕 No ledger found, deploying one with default settings...");
            let config = LedgerConfig::load(&data_dir.join(CONFIG_FILE))?;
            let deployer = wallet_manager.create_wallet(Some("deployer"))?;
            println!("   🔐 Deployer wallet: {}", deployer.address());
            let sequencer = Sequencer::deploy(&config, deployer.address())?;
            storage.save(&sequencer)?;
            sequencer
        };

        Ok(Self {
            sequencer,
            storage,
            wallet_manager,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.sequencer)?;
        Ok(())
    }

    /// Parse a whole-token amount (e.g. `100.5`) into raw units
    pub fn parse_amount(&self, amount: &str) -> CliResult<u128> {
        Ok(parse_units(amount, self.sequencer.ledger().decimals())?)
    }

    fn format(&self, amount: u128) -> String {
        let ledger = self.sequencer.ledger();
        format!("{} {}", format_units(amount, ledger.decimals()), ledger.symbol())
    }
}

/// Parse an account address given on the command line
pub fn parse_address(address: &str) -> CliResult<Address> {
    Ok(address.parse::<Address>()?)
}

/// Deploy a new ledger
pub fn cmd_init(data_dir: &Path, options: InitOptions) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() {
        println!("⚠️  Ledger already exists at {:?}", data_dir);
        println!("   Remove the data directory to deploy a new one");
        return Ok(());
    }

    let config_path = data_dir.join(CONFIG_FILE);
    let mut config = LedgerConfig::load(&config_path)?;
    if let Some(name) = options.name {
        config.name = name;
    }
    if let Some(symbol) = options.symbol {
        config.symbol = symbol;
    }
    if let Some(decimals) = options.decimals {
        config.decimals = decimals;
    }
    if let Some(supply) = &options.supply {
        config.initial_supply = parse_units(supply, config.decimals)?;
    }
    if options.open_mint {
        config.mint_policy = MintPolicy::Open;
    }

    let wallet_manager = WalletManager::new(&data_dir.join("wallets"))?;
    let deployer = match &options.deployer {
        Some(address) => wallet_manager.load_wallet(&parse_address(address)?)?,
        None => wallet_manager.create_wallet(Some("deployer"))?,
    };

    let sequencer = Sequencer::deploy(&config, deployer.address())?;
    storage.save(&sequencer)?;
    config.save(&config_path)?;

    let ledger = sequencer.ledger();
    println!("✅ Ledger deployed!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🪙 Token: {} ({})", ledger.name(), ledger.symbol());
    println!("   🔢 Decimals: {}", ledger.decimals());
    println!(
        "   💰 Initial supply: {} {}",
        format_units(ledger.total_supply(), ledger.decimals()),
        ledger.symbol()
    );
    println!("   👤 Owner: {}", ledger.owner());
    println!("   📍 Ledger address: {}", ledger.address());

    Ok(())
}

/// Create a new wallet
pub fn cmd_wallet_new(state: &mut AppState, label: Option<&str>) -> CliResult<()> {
    let wallet = state.wallet_manager.create_wallet(label)?;

    println!("🔐 New wallet created!");
    println!("   📍 Address: {}", wallet.address());
    println!("   🔑 Public Key: {}...", &wallet.public_key()[..32]);
    if let Some(l) = &wallet.label {
        println!("   🏷️  Label: {}", l);
    }
    println!("\n   ⚠️  IMPORTANT: Your private key is stored in the wallets directory.");
    println!("   Back up this directory to avoid losing access to your tokens!");

    Ok(())
}

/// List all wallets with their balances
pub fn cmd_wallet_list(state: &AppState) -> CliResult<()> {
    let wallets = state.wallet_manager.list_wallets()?;

    if wallets.is_empty() {
        println!("📭 No wallets found. Create one with: ledger wallet new");
        return Ok(());
    }

    println!("📋 Wallets:");
    for info in &wallets {
        let balance = state.sequencer.ledger().balance_of(&info.address);
        let label = info.label.as_deref().unwrap_or("-");
        println!("   {} ({}) - {}", info.address, label, state.format(balance));
    }

    Ok(())
}

/// Display token info
pub fn cmd_info(state: &AppState) -> CliResult<()> {
    let ledger = state.sequencer.ledger();
    let policy = match ledger.mint_policy() {
        MintPolicy::Owner => "owner only",
        MintPolicy::Open => "open",
    };

    println!("🪙 {} ({})", ledger.name(), ledger.symbol());
    println!("   ├─ Ledger address: {}", ledger.address());
    println!("   ├─ Decimals: {}", ledger.decimals());
    println!("   ├─ Total supply: {}", state.format(ledger.total_supply()));
    println!("   ├─ Holders: {}", ledger.holder_count());
    println!("   ├─ Owner: {}", ledger.owner());
    println!("   ├─ Minting: {}", policy);
    println!("   ├─ Calls sequenced: {}", state.sequencer.height());
    println!(
        "   └─ Deployed: {}",
        ledger.deployed_at().format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

/// Show an account balance
pub fn cmd_balance(state: &AppState, address: &str) -> CliResult<()> {
    let address = parse_address(address)?;
    let balance = state.sequencer.ledger().balance_of(&address);

    println!("💰 Balance for {}", address);
    println!("   {} ({} units)", state.format(balance), balance);
    println!("   Next nonce: {}", state.sequencer.nonce(&address));

    Ok(())
}

/// Show a remaining allowance
pub fn cmd_allowance(state: &AppState, owner: &str, spender: &str) -> CliResult<()> {
    let owner = parse_address(owner)?;
    let spender = parse_address(spender)?;
    let allowance = state.sequencer.ledger().allowance(&owner, &spender);

    println!("🤝 Allowance");
    println!("   Owner: {}", owner);
    println!("   Spender: {}", spender);
    println!("   Remaining: {} ({} units)", state.format(allowance), allowance);

    Ok(())
}

/// Sign `call` with the wallet `from`, sequence it and persist the result
///
/// A reverted call is still persisted (its nonce is consumed) and then
/// reported as an error.
pub fn cmd_call(state: &mut AppState, from: &str, call: LedgerCall) -> CliResult<Receipt> {
    let wallet = state.wallet_manager.load_wallet(&parse_address(from)?)?;
    let nonce = state.sequencer.nonce(&wallet.address());
    let signed = wallet.sign_call(state.sequencer.ledger().address(), nonce, call)?;

    let receipt = state.sequencer.submit(&signed)?;
    state.save()?;

    println!("📤 {} from {}", receipt.call.name(), receipt.caller);
    println!("   Sequence: #{}", receipt.seq);
    match &receipt.outcome {
        Outcome::Committed { event } => {
            println!("\n✅ Committed");
            print_event(state, event);
        }
        Outcome::Reverted { error } => {
            println!("\n❌ Reverted: {}", error);
            return Err(error.clone().into());
        }
    }

    Ok(receipt)
}

fn print_event(state: &AppState, event: &LedgerEvent) {
    match event {
        LedgerEvent::Transfer { from, to, amount } => {
            println!("   Transfer {} → {}: {}", from, to, state.format(*amount));
        }
        LedgerEvent::Approval {
            owner,
            spender,
            amount,
        } => {
            println!(
                "   Approval {} → {}: {}",
                owner,
                spender,
                state.format(*amount)
            );
        }
    }
}

/// List recent receipts, newest first
pub fn cmd_history(state: &AppState, count: usize) -> CliResult<()> {
    let receipts = state.sequencer.receipts(count);

    if receipts.is_empty() {
        println!("📭 No calls sequenced yet");
        return Ok(());
    }

    println!("📜 Recent calls:");
    for receipt in receipts.iter().rev() {
        let status = match &receipt.outcome {
            Outcome::Committed { .. } => "✅".to_string(),
            Outcome::Reverted { error } => format!("❌ {}", error.kind()),
        };
        println!(
            "   #{} | {} | {} | {} | {} | {}",
            receipt.seq,
            receipt.timestamp.format("%Y-%m-%d %H:%M:%S"),
            receipt.call.name(),
            receipt.caller,
            state.format(receipt.call.amount()),
            status
        );
    }

    Ok(())
}

/// Export ledger state to file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    crate::storage::save_to_file(&state.sequencer, path)?;
    println!("📦 Ledger exported to {:?}", path);
    Ok(())
}

/// Import ledger state from file
pub fn cmd_import(state: &mut AppState, path: &Path) -> CliResult<()> {
    let sequencer = crate::storage::load_from_file(path)?;

    state.sequencer = sequencer;
    state.save()?;

    println!("📥 Ledger imported from {:?}", path);
    println!(
        "   {} ({}), {} calls sequenced",
        state.sequencer.ledger().name(),
        state.sequencer.ledger().symbol(),
        state.sequencer.height()
    );

    Ok(())
}

/// List backups, or restore backup `index` (0 is the most recent) as the current state
pub fn cmd_restore(state: &mut AppState, index: Option<usize>) -> CliResult<()> {
    let Some(index) = index else {
        let backups = state.storage.list_backups();
        if backups.is_empty() {
            println!("📭 No backups found");
            return Ok(());
        }

        println!("🗄️  Backups (0 is the most recent):");
        for i in backups {
            match state.storage.restore_backup(i) {
                Ok(sequencer) => println!("   [{}] {} calls sequenced", i, sequencer.height()),
                Err(e) => println!("   [{}] unreadable: {}", i, e),
            }
        }
        return Ok(());
    };

    let sequencer = state.storage.restore_backup(index)?;
    state.sequencer = sequencer;
    state.save()?;

    println!("♻️  Restored backup {}", index);
    println!("   {} calls sequenced", state.sequencer.height());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenError;

    fn init_in(dir: &Path) -> AppState {
        cmd_init(
            dir,
            InitOptions {
                supply: Some("1000".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        AppState::new(dir.to_path_buf()).unwrap()
    }

    #[test]
    fn test_init_uses_flags_and_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = init_in(temp_dir.path());
        let ledger = state.sequencer.ledger();

        assert_eq!(ledger.symbol(), "TT");
        assert_eq!(ledger.total_supply(), 1_000_000_000);
        assert_eq!(ledger.balance_of(&ledger.owner()), 1_000_000_000);
        assert!(temp_dir.path().join(CONFIG_FILE).exists());
        assert_eq!(state.wallet_manager.list_wallets().unwrap().len(), 1);
    }

    #[test]
    fn test_call_persists_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init_in(temp_dir.path());
        let owner = state.sequencer.ledger().owner().to_string();
        let bob = Address::derive(b"bob");

        let amount = state.parse_amount("100.5").unwrap();
        assert_eq!(amount, 100_500_000);
        let receipt =
            cmd_call(&mut state, &owner, LedgerCall::Transfer { to: bob, amount }).unwrap();
        assert!(receipt.is_committed());

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.sequencer.ledger().balance_of(&bob), 100_500_000);
        assert_eq!(reloaded.sequencer.height(), 2);
    }

    #[test]
    fn test_reverted_call_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init_in(temp_dir.path());
        let owner_address = state.sequencer.ledger().owner();
        let owner = owner_address.to_string();

        let err = cmd_call(
            &mut state,
            &owner,
            LedgerCall::Burn {
                amount: 2_000_000_000,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TokenError>(),
            Some(TokenError::InsufficientBalance { .. })
        ));
        assert_eq!(state.sequencer.ledger().total_supply(), 1_000_000_000);

        // the revert is still journaled and its nonce consumed on disk
        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.sequencer.nonce(&owner_address), 1);
        assert_eq!(reloaded.sequencer.height(), 2);
    }

    #[test]
    fn test_restore_backup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init_in(temp_dir.path());
        let owner = state.sequencer.ledger().owner().to_string();
        let bob = Address::derive(b"bob");

        cmd_call(&mut state, &owner, LedgerCall::Transfer { to: bob, amount: 5 }).unwrap();
        assert_eq!(state.sequencer.height(), 2);

        // listing leaves the state alone
        cmd_restore(&mut state, None).unwrap();
        assert_eq!(state.sequencer.height(), 2);

        cmd_restore(&mut state, Some(0)).unwrap();
        assert_eq!(state.sequencer.height(), 1);
        assert_eq!(state.sequencer.ledger().balance_of(&bob), 0);

        let reloaded = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.sequencer.height(), 1);

        assert!(cmd_restore(&mut state, Some(9)).is_err());
    }

    #[test]
    fn test_unknown_wallet_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = init_in(temp_dir.path());
        let stranger = Address::derive(b"stranger").to_string();

        assert!(cmd_call(&mut state, &stranger, LedgerCall::Burn { amount: 1 }).is_err());
    }
}
