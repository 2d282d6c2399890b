//! # quotadash-store
//!
//! ホストの状態ストア（`state.vscdb`）を探して開き、クレデンシャルの
//! protobuf メッセージを書き換えるアダプタ。
//!
//! ## ストア上の表現
//!
//! ```text
//! ItemTable
//!   "jetskiStateSync.agentManagerInitState" → Base64(protobuf message)
//!                                               └ field 6: OAuthTokenInfo
//!   "antigravityOnboarding"                 → "true"
//! ```
//!
//! ## 使い方
//!
//! ```no_run
//! use quotadash_store::{open_and_patch, PatcherConfig};
//! use quotadash_wire::Credential;
//!
//! let config = PatcherConfig::default();
//! let credential = Credential {
//!     access_token: Some("ya29...".to_string()),
//!     refresh_token: "1//...".to_string(),
//!     expiry_epoch_seconds: 1_767_225_600,
//! };
//! let (path, outcome) = open_and_patch(&config.locator(), &config.target(), &credential)?;
//! println!("patched {} ({} bytes)", path.display(), outcome.patched_len);
//! # Ok::<(), quotadash_store::StoreError>(())
//! ```
//!
//! ## 並行性
//!
//! すべて同期 API。同じストアに対するパッチは呼び出し側で直列化すること。

pub mod config;
pub mod error;
pub mod locate;
pub mod patch;
pub mod store;

pub use config::PatcherConfig;
pub use error::StoreError;
pub use locate::{platform_candidates, state_db_under, HostInstall, StoreLocator};
pub use patch::{
    open_and_patch, patch_credential, read_credential, PatchOutcome, PatchTarget, CREDENTIAL_FIELD,
    CREDENTIAL_KEY, ONBOARDING_DONE, ONBOARDING_KEY,
};
pub use store::{Compute, MemoryStateStore, SqliteStateStore, StateStore};
