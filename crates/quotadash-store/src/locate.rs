//! ストアファイルの探索
//!
//! ```text
//! 1. ホストのインストール情報から導いたパス
//!      <user-data-dir>/User/globalStorage/state.vscdb
//! 2. プラットフォーム別の既定パス（順番に）
//!      macOS:   ~/Library/Application Support/Antigravity/User/globalStorage/state.vscdb
//!      Windows: %APPDATA%\Antigravity\User\globalStorage\state.vscdb
//!      Linux:   ~/.config/Antigravity/User/globalStorage/state.vscdb
//! ```
//!
//! 最初に存在したファイルを使う。解決結果はキャッシュしない。
//! 呼び出し側が一度解決して [`crate::patch_credential`] などに渡す。

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;

/// ホストのアプリケーションディレクトリ名
pub const HOST_APP_DIR: &str = "Antigravity";

/// user-data-dir からストアファイルへの相対パス
const STATE_DB_SEGMENTS: [&str; 3] = ["User", "globalStorage", "state.vscdb"];

const USER_DATA_DIR_FLAG: &str = "--user-data-dir";

/// ホストのインストール情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInstall {
    /// ホストが `--user-data-dir` で指定されて起動している場合のディレクトリ
    pub user_data_dir: Option<PathBuf>,
}

impl HostInstall {
    /// ホストのコマンドライン引数から user-data-dir を拾う
    ///
    /// `--user-data-dir=DIR` と `--user-data-dir DIR` の両方を受け付ける。
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut user_data_dir = None;

        while let Some(arg) = args.next() {
            let Some(arg) = arg.to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(value) = arg.strip_prefix(USER_DATA_DIR_FLAG) {
                if let Some(dir) = value.strip_prefix('=') {
                    user_data_dir = Some(PathBuf::from(dir));
                } else if value.is_empty() {
                    user_data_dir = args.next().map(PathBuf::from);
                }
            }
        }

        HostInstall {
            user_data_dir: user_data_dir.filter(|d| !d.as_os_str().is_empty()),
        }
    }

    /// インストール情報から導いたストアのパス
    pub fn state_db_path(&self) -> Option<PathBuf> {
        self.user_data_dir.as_deref().map(state_db_under)
    }
}

/// `<dir>/User/globalStorage/state.vscdb`
pub fn state_db_under(user_data_dir: &Path) -> PathBuf {
    STATE_DB_SEGMENTS
        .iter()
        .fold(user_data_dir.to_path_buf(), |path, seg| path.join(seg))
}

/// 現在のプラットフォームの既定候補（優先順）
pub fn platform_candidates() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    // macOS: ~/Library/Application Support, Windows: %APPDATA%, Linux: $XDG_CONFIG_HOME or ~/.config
    if let Some(config) = dirs::config_dir() {
        roots.push(config);
    }
    #[cfg(target_os = "linux")]
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".config"));
    }
    #[cfg(target_os = "windows")]
    if let Some(local) = dirs::data_local_dir() {
        roots.push(local);
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    for root in roots {
        let candidate = state_db_under(&root.join(HOST_APP_DIR));
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// ストアの探索順序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocator {
    primary: Option<PathBuf>,
    fallbacks: Vec<PathBuf>,
}

impl StoreLocator {
    pub fn new(primary: Option<PathBuf>, fallbacks: Vec<PathBuf>) -> Self {
        StoreLocator { primary, fallbacks }
    }

    /// ホスト情報由来のパス → プラットフォーム既定パス の順で探す
    pub fn for_host(host: &HostInstall) -> Self {
        Self::new(host.state_db_path(), platform_candidates())
    }

    /// 探索するパスを優先順に返す
    pub fn candidates(&self) -> impl Iterator<Item = &PathBuf> {
        self.primary.iter().chain(self.fallbacks.iter())
    }

    /// 最初に存在するファイルを返す
    ///
    /// # エラー
    /// - `StoreError::StoreNotFound`: どの候補も存在しない
    pub fn resolve(&self) -> Result<PathBuf, StoreError> {
        for candidate in self.candidates() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "state store found");
                return Ok(candidate.clone());
            }
            debug!(path = %candidate.display(), "state store candidate missing");
        }

        Err(StoreError::StoreNotFound {
            candidates: self.candidates().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_host_install_from_args() {
        let host = HostInstall::from_args(["antigravity", "--user-data-dir=/data/ag", "--verbose"]);
        assert_eq!(host.user_data_dir, Some(PathBuf::from("/data/ag")));

        let host = HostInstall::from_args(["antigravity", "--user-data-dir", "/data/ag2"]);
        assert_eq!(host.user_data_dir, Some(PathBuf::from("/data/ag2")));

        let host = HostInstall::from_args(["antigravity", "--user-data-directory=/x"]);
        assert_eq!(host.user_data_dir, None);

        let host = HostInstall::from_args(["antigravity", "--user-data-dir="]);
        assert_eq!(host.user_data_dir, None);
    }

    #[test]
    fn test_state_db_path() {
        let host = HostInstall {
            user_data_dir: Some(PathBuf::from("/data/ag")),
        };
        assert_eq!(
            host.state_db_path(),
            Some(PathBuf::from("/data/ag/User/globalStorage/state.vscdb"))
        );
        assert_eq!(HostInstall::default().state_db_path(), None);
    }

    #[test]
    fn test_platform_candidates_end_with_state_db() {
        for candidate in platform_candidates() {
            assert!(candidate.ends_with("Antigravity/User/globalStorage/state.vscdb"));
        }
    }

    #[test]
    fn test_resolve_prefers_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = state_db_under(&dir.path().join("primary"));
        let fallback = dir.path().join("fallback.vscdb");
        touch(&primary);
        touch(&fallback);

        let locator = StoreLocator::new(Some(primary.clone()), vec![fallback]);
        assert_eq!(locator.resolve().unwrap(), primary);
    }

    #[test]
    fn test_resolve_first_existing_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.vscdb");
        let second = dir.path().join("second.vscdb");
        let third = dir.path().join("third.vscdb");
        touch(&second);
        touch(&third);

        let locator = StoreLocator::new(
            Some(dir.path().join("no-primary.vscdb")),
            vec![missing, second.clone(), third],
        );
        assert_eq!(locator.resolve().unwrap(), second);
    }

    #[test]
    fn test_resolve_not_found_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.vscdb");
        let b = dir.path().join("b.vscdb");

        let locator = StoreLocator::new(None, vec![a.clone(), b.clone()]);
        match locator.resolve() {
            Err(StoreError::StoreNotFound { candidates }) => assert_eq!(candidates, vec![a, b]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        let as_dir = dir.path().join("state.vscdb");
        fs::create_dir_all(&as_dir).unwrap();

        let locator = StoreLocator::new(Some(as_dir), vec![]);
        assert!(locator.resolve().is_err());
    }
}
