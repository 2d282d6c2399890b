//! ダッシュボードのアカウントファイル
//!
//! クレデンシャルストアが保存する JSON から、パッチに必要なトークンだけを取り出す。
//!
//! ```json
//! {
//!   "email": "user@example.com",
//!   "token": {
//!     "access_token": "ya29...",
//!     "refresh_token": "1//...",
//!     "expiry_timestamp": 1767225600
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quotadash_wire::Credential;
use serde::Deserialize;

/// アカウントファイル（未知のフィールドは無視する）
#[derive(Debug, Deserialize)]
pub struct AccountFile {
    #[serde(default)]
    pub email: Option<String>,
    pub token: TokenData,
}

#[derive(Debug, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub access_token: Option<String>,
    pub refresh_token: String,
    /// 有効期限（Unix 秒）
    pub expiry_timestamp: u64,
}

impl From<TokenData> for Credential {
    fn from(token: TokenData) -> Self {
        Credential {
            // 空文字列は「無し」と同じ扱い（サブフィールドを書かない）
            access_token: token.access_token.filter(|t| !t.is_empty()),
            refresh_token: token.refresh_token,
            expiry_epoch_seconds: token.expiry_timestamp,
        }
    }
}

impl AccountFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read account file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse account file {}", path.display()))
    }
}
