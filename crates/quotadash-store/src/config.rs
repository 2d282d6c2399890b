//! パッチャーの設定
//!
//! JSON ファイルで与える。すべて省略可能で、省略時はホストの既定値になる。
//!
//! ```json
//! {
//!   "store_path": "/explicit/state.vscdb",
//!   "user_data_dir": "/data/antigravity",
//!   "fallback_paths": ["/somewhere/state.vscdb"],
//!   "credential_key": "jetskiStateSync.agentManagerInitState",
//!   "onboarding_key": "antigravityOnboarding",
//!   "target_field": 6
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::locate::{platform_candidates, HostInstall, StoreLocator};
use crate::patch::{PatchTarget, CREDENTIAL_FIELD, CREDENTIAL_KEY, ONBOARDING_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatcherConfig {
    /// 指定するとこのパスだけを使い、探索しない
    pub store_path: Option<PathBuf>,
    /// ホストの user-data-dir（探索の最優先候補になる）
    pub user_data_dir: Option<PathBuf>,
    /// 空でなければプラットフォーム既定パスの代わりに使う
    pub fallback_paths: Vec<PathBuf>,
    pub credential_key: String,
    pub onboarding_key: String,
    pub target_field: u32,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        PatcherConfig {
            store_path: None,
            user_data_dir: None,
            fallback_paths: Vec::new(),
            credential_key: CREDENTIAL_KEY.to_string(),
            onboarding_key: ONBOARDING_KEY.to_string(),
            target_field: CREDENTIAL_FIELD,
        }
    }
}

impl PatcherConfig {
    /// JSON ファイルから読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 設定からストアの探索順序を作る
    pub fn locator(&self) -> StoreLocator {
        if let Some(path) = &self.store_path {
            return StoreLocator::new(Some(path.clone()), Vec::new());
        }

        let host = HostInstall {
            user_data_dir: self.user_data_dir.clone(),
        };
        let fallbacks = if self.fallback_paths.is_empty() {
            platform_candidates()
        } else {
            self.fallback_paths.clone()
        };
        StoreLocator::new(host.state_db_path(), fallbacks)
    }

    /// 書き換え対象のキーとフィールド番号
    pub fn target(&self) -> PatchTarget {
        PatchTarget {
            credential_key: self.credential_key.clone(),
            onboarding_key: self.onboarding_key.clone(),
            field_number: self.target_field,
        }
    }
}
