//! # quotadash-cli
//!
//! ダッシュボードのアカウントファイルからトークンを取り出し、ホストの状態ストアへ書き込む。
//!
//! ```text
//! quotadash patch --account account.json      # 書き換え
//! quotadash patch --account account.json --dry-run
//! quotadash inspect                           # 現在の内容を表示
//! ```
//!
//! 書き換えに成功した場合だけホストの再起動を促す。失敗した場合、ストアは元のまま。

pub mod account;
pub mod cli;

pub use cli::{run, Cli, Command, PatchArgs};
