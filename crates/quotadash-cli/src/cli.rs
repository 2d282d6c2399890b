//! コマンドライン定義と実行

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use quotadash_store::{
    open_and_patch, patch_credential, read_credential, MemoryStateStore, PatchOutcome,
    PatcherConfig, SqliteStateStore, StateStore,
};
use quotadash_wire::Credential;
use serde_json::json;
use tracing::debug;

use crate::account::AccountFile;

#[derive(Parser, Debug)]
#[command(
    name = "quotadash",
    version,
    about = "Write a dashboard account's credential into the Antigravity state store",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Patcher config file (JSON).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use this state.vscdb directly instead of searching.
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Host user-data-dir (searched before the platform defaults).
    #[arg(long, global = true, value_name = "DIR")]
    pub user_data_dir: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace the stored credential with the one from an account file.
    Patch(PatchArgs),

    /// Show the credential currently stored (tokens masked).
    Inspect,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Account file (JSON) holding the token to write.
    #[arg(long, value_name = "PATH")]
    pub account: PathBuf,

    /// Compute the patch without writing to the store.
    #[arg(long)]
    pub dry_run: bool,
}

/// コマンドを実行し、結果を `out` に書く
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = load_config(&cli)?;
    let target = config.target();

    match cli.command {
        Command::Patch(args) => {
            let account = AccountFile::load(&args.account)?;
            let credential = Credential::from(account.token);

            if args.dry_run {
                let path = config.locator().resolve()?;
                let outcome = dry_run(&SqliteStateStore::open(&path)?, &config, &credential)?;
                writeln!(out, "dry run against {}: nothing written", path.display())?;
                print_outcome(out, &outcome)?;
                return Ok(());
            }

            let (path, outcome) = open_and_patch(&config.locator(), &target, &credential)
                .context("credential patch failed; the host state store was left as it was")?;
            writeln!(out, "credential written to {}", path.display())?;
            print_outcome(out, &outcome)?;
            if !outcome.onboarding_written {
                writeln!(
                    out,
                    "warning: the onboarding flag could not be written; the host may show its first-run screen"
                )?;
            }
            writeln!(
                out,
                "Restart Antigravity completely (quit all windows) to pick up the new credential."
            )?;
        }
        Command::Inspect => {
            let path = config.locator().resolve()?;
            let store = SqliteStateStore::open(&path)?;
            let credential = read_credential(&store, &target)?;
            let onboarding = store.get(&target.onboarding_key)?;

            let report = json!({
                "store": path.display().to_string(),
                "onboarding": onboarding,
                "credential": credential.map(|c| json!({
                    "access_token": c.access_token.as_deref().map(mask),
                    "refresh_token": mask(&c.refresh_token),
                    "expiry_epoch_seconds": c.expiry_epoch_seconds,
                })),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
    }

    Ok(())
}

/// 設定ファイルを読み、コマンドライン引数で上書きする
fn load_config(cli: &Cli) -> Result<PatcherConfig> {
    let mut config = match &cli.config {
        Some(path) => PatcherConfig::load(path)?,
        None => PatcherConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    if let Some(dir) = &cli.user_data_dir {
        config.user_data_dir = Some(dir.clone());
    }
    debug!(?config, "effective config");
    Ok(config)
}

/// 対象の 2 キーだけをメモリに写してパッチする
fn dry_run(
    store: &SqliteStateStore,
    config: &PatcherConfig,
    credential: &Credential,
) -> Result<PatchOutcome> {
    let target = config.target();
    let mut scratch = MemoryStateStore::new();
    for key in [&target.credential_key, &target.onboarding_key] {
        if let Some(value) = store.get(key)? {
            scratch.upsert(key, &value)?;
        }
    }
    Ok(patch_credential(&mut scratch, &target, credential)?)
}

fn print_outcome(out: &mut impl Write, outcome: &PatchOutcome) -> Result<()> {
    writeln!(
        out,
        "message: {} -> {} bytes, replaced {} credential field(s)",
        outcome.previous_len, outcome.patched_len, outcome.removed_fields
    )?;
    Ok(())
}

/// 先頭 6 文字だけ残す
fn mask(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    if prefix.len() == token.len() {
        "*".repeat(token.chars().count())
    } else {
        format!("{prefix}...")
    }
}
