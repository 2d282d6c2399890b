//! quotadash-store エラー型

use std::path::PathBuf;

use quotadash_wire::WireError;
use thiserror::Error;

/// ストア操作のエラー
///
/// どのエラーでもパッチは中断される。書き込み前に起きたエラーではストアは変更されない。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 候補パスがどれも存在しない
    #[error("state store not found (searched: {})", join_paths(.candidates))]
    StoreNotFound { candidates: Vec<PathBuf> },

    /// SQLite の読み書きに失敗
    #[error("state store I/O failed at {path:?}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// 保存値が Base64 として読めない
    #[error("value of {key} is not valid base64: {source}")]
    InvalidBase64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    /// 保存値がテキストでも UTF-8 の BLOB でもない
    #[error("value of {key} is not text")]
    NonTextValue { key: String },

    /// 保存されたメッセージの wire format が壊れている
    #[error("stored message is malformed: {0}")]
    Wire(#[from] WireError),

    /// 設定ファイルの読み込みに失敗
    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 設定ファイルの JSON が不正
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return String::from("no candidates");
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
