//! CLI tool for depositing escrow collateral for a generated agent wallet.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use agent_collateral::amount::validate_amount;
use agent_collateral::chain::ChainCatalog;
use agent_collateral::{
    offers_collateral_deposit, Address, AssetSelection, CollateralDepositor, Config,
    DepositOutcome, DepositRequest, RpcLedger, SigningKey,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Register an agent wallet with the 4mica escrow by depositing collateral.
#[derive(Parser, Debug)]
#[command(name = "collateral-deposit")]
struct Cli {
    /// Chain key from the catalog (e.g. eth-sepolia, polygon-amoy)
    #[arg(long, env = "CHAIN")]
    chain: Option<String>,

    /// JSON config file
    #[arg(long, env = "COLLATERAL_CONFIG")]
    config: Option<PathBuf>,

    /// Escrow contract address
    #[arg(long, env = "ESCROW_CONTRACT")]
    escrow_contract: Option<String>,

    /// Override the chain's JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Wallet private key (prompted when absent)
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Collateral asset: usdc, usdt or native
    #[arg(long)]
    asset: Option<AssetSelection>,

    /// Amount in human units, e.g. 1.5
    #[arg(long)]
    amount: Option<String>,

    /// Features enabled for the agent
    #[arg(long, value_delimiter = ',', default_value = "x402")]
    features: Vec<String>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    let catalog = ChainCatalog::builtin();
    let chain = catalog.get(&config.chain)?.clone();

    if !offers_collateral_deposit(&chain, cli.features.as_slice()) {
        println!("4mica collateral deposit is not available on {}.", chain.name);
        return Ok(());
    }

    let mut prompter = Prompter::stdin();
    if !cli.yes && !prompter.confirm("Register with 4mica now (optional collateral deposit)?")? {
        return Ok(());
    }

    let Some(signing_key) = cli.signing_key(&mut prompter)? else {
        println!("Skipping 4mica registration (private key required).");
        return Ok(());
    };
    let asset = match cli.asset {
        Some(asset) => asset,
        None => prompter.asset()?,
    };
    let human_amount = match &cli.amount {
        Some(amount) => validate_amount(amount)?.to_string(),
        None => prompter.amount(asset)?,
    };

    let request = DepositRequest {
        chain: chain.name.clone(),
        signing_key,
        asset,
        human_amount,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime
        .block_on(async {
            let ledger = RpcLedger::connect(&config, &chain).await?;
            CollateralDepositor::new(ledger)
                .attempt_deposit(&request)
                .await
        })
        .context("4mica registration failed")?;

    println!("{outcome}");
    if let DepositOutcome::Deposited {
        deposit_tx: Some(tx),
        ..
    } = &outcome
    {
        if !chain.explorer_url.is_empty() {
            println!("{}/tx/{tx}", chain.explorer_url.trim_end_matches('/'));
        }
    }
    Ok(())
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(chain) = &self.chain {
            config.chain = chain.clone();
        }
        if let Some(escrow) = &self.escrow_contract {
            config.escrow_contract = Some(
                escrow
                    .parse::<Address>()
                    .with_context(|| format!("invalid escrow contract: {escrow}"))?,
            );
        }
        if let Some(url) = &self.rpc_url {
            config.rpc_url = Some(url.clone());
        }
        Ok(config)
    }

    fn signing_key(&self, prompter: &mut Prompter) -> Result<Option<SigningKey>> {
        match &self.private_key {
            Some(key) if !key.trim().is_empty() => Ok(Some(SigningKey::parse(key)?)),
            _ => prompter.signing_key(),
        }
    }
}

/// Line-based text prompts.
struct Prompter {
    input: Box<dyn BufRead>,
}

impl Prompter {
    fn stdin() -> Self {
        Self {
            input: Box::new(io::BufReader::new(io::stdin())),
        }
    }

    fn ask(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => print!("{message} ({default}) "),
            None => print!("{message} "),
        }
        io::stdout().flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("input closed");
        }
        let answer = line.trim();
        Ok(match default {
            Some(default) if answer.is_empty() => default.to_string(),
            _ => answer.to_string(),
        })
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        let answer = self.ask(&format!("{message} [y/N]"), None)?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn signing_key(&mut self) -> Result<Option<SigningKey>> {
        loop {
            let answer = self.ask("Wallet private key (leave empty to skip):", None)?;
            if answer.is_empty() {
                return Ok(None);
            }
            match SigningKey::parse(&answer) {
                Ok(key) => return Ok(Some(key)),
                Err(_) => println!("Enter a valid 32-byte hex private key"),
            }
        }
    }

    fn asset(&mut self) -> Result<AssetSelection> {
        loop {
            let answer = self.ask(
                "Collateral asset to deposit [usdc/usdt/native]:",
                Some(AssetSelection::Usdc.key()),
            )?;
            match answer.parse() {
                Ok(asset) => return Ok(asset),
                Err(err) => println!("{err}"),
            }
        }
    }

    fn amount(&mut self, asset: AssetSelection) -> Result<String> {
        loop {
            let answer = self.ask(
                &format!("Deposit amount ({}):", asset.label()),
                Some(asset.default_amount()),
            )?;
            match validate_amount(&answer) {
                Ok(amount) => return Ok(amount.to_string()),
                Err(_) => println!("Enter a positive number"),
            }
        }
    }
}
