//! Safe coordinator CLI
//!
//! Every command prints one JSON document on stdout. Logs go to stderr and
//! follow `RUST_LOG` (default `warn`).

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use safe_coordinator::signing::wallet_from_hex;
use safe_coordinator::tx::encode_function_call;
use safe_coordinator::utils::crypto::{parse_address, parse_hex_bytes};
use safe_coordinator::{
    aggregate, approve_on_chain, check_nonce, collect_signatures, digest_for_raw_message, submit,
    verify_digest_onchain, ChainProvider, CoordinatorConfig, CoordinatorError, Operation, RpcSafeClient,
    SafeDomain, SafeTransaction, SafeTransactionBuilder, SafeTxContext, SafeVerifier, SignatureArtifact,
    SignatureBlob, SignatureMethod, SignatureRequest, SigningPrimitive,
};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "safe-coordinator")]
#[command(version)]
#[command(about = "Coordinate Safe multi-signature transactions", long_about = None)]
struct Cli {
    /// JSON config file; flags and SAFE_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain the Safe lives on
    #[arg(long, env = "SAFE_RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Safe contract address
    #[arg(long, env = "SAFE_ADDRESS", global = true)]
    safe: Option<String>,

    /// Chain id for the digest domain; queried from the node when omitted
    #[arg(long, env = "SAFE_CHAIN_ID", global = true)]
    chain_id: Option<u64>,

    /// Account sending execTransaction
    #[arg(long, env = "SAFE_EXECUTOR", global = true)]
    executor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the Safe transaction digest
    Digest {
        #[command(flatten)]
        tx: TxArgs,

        /// Compare with the Safe's getTransactionHash
        #[arg(long)]
        verify_onchain: bool,
    },

    /// Compute the SafeMessage digest of raw bytes
    MessageDigest {
        /// Message as hex
        #[arg(long)]
        message: String,
    },

    /// Collect signatures from local keys
    Sign {
        #[command(flatten)]
        tx: TxArgs,

        /// Private key as hex; repeat for several signers
        #[arg(long = "key", env = "SAFE_SIGNER_KEYS", value_delimiter = ',', required = true, hide_env_values = true)]
        keys: Vec<String>,

        /// structured, raw-hash, approve or approve-skip
        #[arg(long, default_value = "structured")]
        method: SignatureMethod,

        /// Give up on signers still running after this many seconds
        #[arg(long, env = "SAFE_SIGNER_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },

    /// Record approveHash for owners unlocked on the node
    Approve {
        #[command(flatten)]
        tx: TxArgs,

        /// Owner address; repeat for several owners
        #[arg(long = "owner", required = true)]
        owners: Vec<String>,

        /// Send nothing, only emit the placeholder entries
        #[arg(long, env = "SAFE_SKIP_ON_CHAIN_APPROVAL")]
        skip: bool,
    },

    /// Combine signatures into the blob execTransaction expects
    Aggregate {
        /// `signer:signature` pair in hex; repeat for each signer
        #[arg(long = "signature", required = true)]
        signatures: Vec<String>,
    },

    /// Submit execTransaction with an aggregated blob
    Exec {
        #[command(flatten)]
        tx: TxArgs,

        /// Aggregated signatures as hex
        #[arg(long)]
        signatures: String,
    },
}

/// Fields of the Safe transaction being coordinated
#[derive(Args, Debug)]
struct TxArgs {
    /// Target of the Safe call
    #[arg(long)]
    to: String,

    /// Wei sent with the call
    #[arg(long, default_value = "0")]
    value: String,

    /// Calldata as hex
    #[arg(long, conflicts_with = "call")]
    data: Option<String>,

    /// Function to encode as calldata, e.g. "transfer(address,uint256)"
    #[arg(long)]
    call: Option<String>,

    /// Argument for --call; repeat in order
    #[arg(long = "arg", requires = "call")]
    args: Vec<String>,

    /// call or delegatecall
    #[arg(long, default_value = "call")]
    operation: Operation,

    #[arg(long, default_value = "0")]
    safe_tx_gas: String,

    #[arg(long, default_value = "0")]
    base_gas: String,

    #[arg(long, default_value = "0")]
    gas_price: String,

    #[arg(long)]
    gas_token: Option<String>,

    #[arg(long)]
    refund_receiver: Option<String>,

    /// Safe nonce; read from the Safe when omitted
    #[arg(long)]
    nonce: Option<String>,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Coordinator errors are reported as JSON so scripts can read code, stage
/// and signer
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<CoordinatorError>() {
        Some(e) => eprintln!("{}", json!({ "error": e })),
        None => eprintln!("error: {:#}", err),
    }
}

fn run(cli: Cli) -> Result<()> {
    // Offline, so no Safe or node is needed
    if let Commands::Aggregate { signatures } = &cli.command {
        return aggregate_pairs(signatures);
    }

    let config = load_config(&cli)?;
    let client = Arc::new(config.rpc_client()?);

    match cli.command {
        Commands::Digest { tx, verify_onchain } => {
            let ctx = context(&config, client.as_ref(), &tx)?;
            if verify_onchain {
                verify_digest_onchain(client.as_ref(), &ctx)?;
            }
            print_json(&json!({
                "safeTxHash": ctx.digest(),
                "domain": ctx.domain(),
                "transaction": ctx.transaction(),
                "verifiedOnchain": verify_onchain,
            }))
        }

        Commands::MessageDigest { message } => {
            let chain_id = chain_id(&config, client.as_ref())?;
            let message = parse_hex_bytes(&message)?;
            let digest = digest_for_raw_message(config.safe_address, chain_id, &message);
            print_json(&json!({
                "safeMessageHash": digest,
                "domain": SafeDomain::new(config.safe_address, chain_id),
            }))
        }

        Commands::Sign {
            tx,
            keys,
            method,
            timeout_secs,
        } => {
            let ctx = Arc::new(context(&config, client.as_ref(), &tx)?);
            let keys: Vec<Zeroizing<String>> = keys.into_iter().map(Zeroizing::new).collect();

            let mut requests = Vec::with_capacity(keys.len());
            for key in &keys {
                let wallet = wallet_from_hex(key)?;
                let signer: Arc<dyn SigningPrimitive> = Arc::new(wallet);
                requests.push(SignatureRequest::new(signer, method));
            }
            drop(keys);

            let deadline = timeout_secs.map(Duration::from_secs).or_else(|| config.signer_timeout());
            let verifier: Arc<dyn SafeVerifier> = client.clone();
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            let outcome = runtime.block_on(collect_signatures(Arc::clone(&ctx), verifier, requests, deadline));

            print_json(&json!({
                "safeTxHash": ctx.digest(),
                "signatures": outcome.artifacts,
                "failures": outcome.failures,
                "abandoned": outcome.abandoned,
            }))?;
            // Abandoned producers keep running on the blocking pool; don't wait for them
            runtime.shutdown_background();

            if !outcome.is_complete() {
                bail!(
                    "{} signer(s) failed and {} were abandoned",
                    outcome.failures.len(),
                    outcome.abandoned.len()
                );
            }
            Ok(())
        }

        Commands::Approve { tx, owners, skip } => {
            let ctx = context(&config, client.as_ref(), &tx)?;
            let skip = skip || config.skip_on_chain_approval;

            let mut artifacts = Vec::with_capacity(owners.len());
            for owner in &owners {
                let owner = parse_address(owner)?;
                artifacts.push(approve_on_chain(owner, client.as_ref(), &ctx, skip)?);
            }
            print_json(&json!({
                "safeTxHash": ctx.digest(),
                "signatures": artifacts,
                "onChain": !skip,
            }))
        }

        Commands::Aggregate { signatures } => aggregate_pairs(&signatures),

        Commands::Exec { tx, signatures } => {
            let transaction = transaction(client.as_ref(), &tx)?;
            if tx.nonce.is_some() {
                check_nonce(client.as_ref(), &transaction)?;
            }
            let blob = SignatureBlob::from_bytes(parse_hex_bytes(&signatures)?);
            let receipt = submit(client.as_ref(), &transaction, &blob)?;
            print_json(&receipt)?;
            receipt.ensure_success()?;
            Ok(())
        }
    }
}

/// Config file first, then flags and environment on top
fn load_config(cli: &Cli) -> Result<CoordinatorConfig> {
    let mut config = match (&cli.config, &cli.safe) {
        (Some(path), _) => CoordinatorConfig::from_file(path)?,
        (None, Some(safe)) => CoordinatorConfig::new(parse_address(safe)?),
        (None, None) => bail!("no Safe address: pass --safe, set SAFE_ADDRESS or use --config"),
    };

    if let (Some(_), Some(safe)) = (&cli.config, &cli.safe) {
        config.safe_address = parse_address(safe)?;
    }
    if let Some(url) = &cli.rpc_url {
        config.rpc_url = url.clone();
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = Some(chain_id);
    }
    if let Some(executor) = &cli.executor {
        config.executor = Some(parse_address(executor)?);
    }

    config.validate()?;
    Ok(config)
}

fn chain_id(config: &CoordinatorConfig, client: &RpcSafeClient) -> Result<u64> {
    match config.chain_id {
        Some(id) => Ok(id),
        None => client
            .chain_id()
            .map_err(|e| anyhow!(e).context("chain id not configured and the node could not be asked")),
    }
}

fn transaction(client: &RpcSafeClient, args: &TxArgs) -> Result<SafeTransaction> {
    let nonce = match &args.nonce {
        Some(nonce) => nonce.clone(),
        None => client.nonce()?.to_string(),
    };

    let mut builder = SafeTransactionBuilder::new(&args.to)
        .value(&args.value)
        .operation(args.operation)
        .safe_tx_gas(&args.safe_tx_gas)
        .base_gas(&args.base_gas)
        .gas_price(&args.gas_price)
        .nonce(&nonce);

    if let Some(signature) = &args.call {
        builder = builder.data(encode_function_call(signature, &args.args)?);
    } else if let Some(data) = &args.data {
        builder = builder.data_hex(data);
    }
    if let Some(token) = &args.gas_token {
        builder = builder.gas_token(token);
    }
    if let Some(receiver) = &args.refund_receiver {
        builder = builder.refund_receiver(receiver);
    }

    Ok(builder.build()?)
}

fn context(config: &CoordinatorConfig, client: &RpcSafeClient, args: &TxArgs) -> Result<SafeTxContext> {
    let chain_id = chain_id(config, client)?;
    let tx = transaction(client, args)?;
    Ok(SafeTxContext::new(SafeDomain::new(config.safe_address, chain_id), tx))
}

fn aggregate_pairs(pairs: &[String]) -> Result<()> {
    let artifacts = pairs
        .iter()
        .map(|pair| parse_artifact(pair))
        .collect::<Result<Vec<_>>>()?;
    let blob = aggregate(artifacts)?;
    print_json(&json!({
        "signatures": blob,
        "count": blob.signature_count(),
    }))
}

/// `0xsigner:0xsignature`
fn parse_artifact(pair: &str) -> Result<SignatureArtifact> {
    let (signer, data) = pair
        .split_once(':')
        .ok_or_else(|| anyhow!("expected signer:signature, got {:?}", pair))?;
    Ok(SignatureArtifact::new(parse_address(signer)?, parse_hex_bytes(data)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
