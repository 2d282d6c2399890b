//! キー/値ストアの抽象と実装
//!
//! ホストの `state.vscdb` は SQLite で、次のテーブルに文字列キーで値を持つ。
//!
//! ```text
//! CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)
//! ```
//!
//! 外部コマンドは使わず rusqlite で直接読み書きする。値はバインドパラメータで
//! 渡すので、引用符を含む値でもエスケープの問題は起きない。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;

/// ホストが書き込み中の場合に待つ上限
const BUSY_TIMEOUT_MS: u64 = 5_000;

const SELECT_VALUE: &str = "SELECT value FROM ItemTable WHERE key = ?1";
const UPSERT_VALUE: &str = "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)";

/// `key` の現在値から書き込む行を計算する関数
pub type Compute<'a> =
    dyn FnMut(Option<String>) -> Result<Vec<(String, String)>, StoreError> + 'a;

/// キー/値ストア
///
/// 呼び出しは同期（ブロッキング）。同じストアへの同時パッチは呼び出し側で直列化する。
pub trait StateStore {
    /// キーの値を返す（存在しなければ `None`）
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// キーの値を挿入または置換する
    fn upsert(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// [`StateStore::upsert_batch`] が全件成功か全件失敗かを保証するか
    fn is_atomic(&self) -> bool {
        false
    }

    /// 複数行をまとめて書き込む
    ///
    /// 既定実装は 1 行ずつ `upsert` するだけで、途中で失敗すると先頭側の行は書き込まれたまま残る。
    fn upsert_batch(&mut self, rows: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in rows {
            self.upsert(key, value)?;
        }
        Ok(())
    }

    /// `key` を読み、`compute` が返した行を書き込む
    ///
    /// `compute` がエラーを返した場合は何も書かない。既定実装は `get` と
    /// `upsert_batch` を順に呼ぶだけなので、その間に入った他の書き込みは上書きされる。
    /// アトミックなストアは読み取りから書き込みまでを 1 トランザクションで行う。
    fn read_modify_write(&mut self, key: &str, compute: &mut Compute<'_>) -> Result<(), StoreError> {
        let current = self.get(key)?;
        let rows = compute(current)?;
        let rows: Vec<(&str, &str)> = rows.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.upsert_batch(&rows)
    }
}

/// SQLite（`state.vscdb`）上のストア
pub struct SqliteStateStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStateStore {
    /// 既存のストアを読み書きモードで開く（ファイルは作成しない）
    ///
    /// # エラー
    /// - `StoreError::StoreNotFound`: ファイルが存在しない
    /// - `StoreError::StoreIo`: SQLite として開けない
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StoreError::StoreNotFound {
                candidates: vec![path],
            });
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags).map_err(|source| {
            StoreError::StoreIo {
                path: path.clone(),
                source,
            }
        })?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .map_err(|source| StoreError::StoreIo {
                path: path.clone(),
                source,
            })?;

        Ok(SqliteStateStore { conn, path })
    }

    /// ホストと同じスキーマの空ストアを作成して開く（フィクスチャ用）
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::StoreIo {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
        )
        .map_err(|source| StoreError::StoreIo {
            path: path.clone(),
            source,
        })?;
        drop(conn);

        Self::open(path)
    }

    /// 開いているファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: rusqlite::Error) -> StoreError {
        StoreError::StoreIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = select_value(&self.conn, key).map_err(|e| self.io_error(e))?;
        value_to_text(key, value)
    }

    fn upsert(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(UPSERT_VALUE, params![key, value])
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn is_atomic(&self) -> bool {
        true
    }

    /// 1 トランザクションで全行を書き込む
    fn upsert_batch(&mut self, rows: &[(&str, &str)]) -> Result<(), StoreError> {
        let path = &self.path;
        let io_error = |source| StoreError::StoreIo {
            path: path.clone(),
            source,
        };

        let tx = self.conn.transaction().map_err(io_error)?;
        for (key, value) in rows {
            tx.execute(UPSERT_VALUE, params![key, value])
                .map_err(io_error)?;
        }
        tx.commit().map_err(io_error)
    }

    /// 書き込みロックを取ってから読むので、読んだ後にホストの書き込みが割り込むことはない
    fn read_modify_write(&mut self, key: &str, compute: &mut Compute<'_>) -> Result<(), StoreError> {
        let path = &self.path;
        let io_error = |source| StoreError::StoreIo {
            path: path.clone(),
            source,
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(io_error)?;
        let current = value_to_text(key, select_value(&tx, key).map_err(io_error)?)?;
        // ここでエラーなら tx は drop されロールバックされる
        let rows = compute(current)?;
        for (key, value) in &rows {
            tx.execute(UPSERT_VALUE, params![key, value])
                .map_err(io_error)?;
        }
        tx.commit().map_err(io_error)
    }
}

fn select_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<Value>> {
    conn.query_row(SELECT_VALUE, params![key], |row| row.get::<_, Value>(0))
        .optional()
}

/// 保存値をテキストとして取り出す
///
/// ホストはテキストで書くが、BLOB として入っていることもある。NULL は「無し」と同じ扱い。
fn value_to_text(key: &str, value: Option<Value>) -> Result<Option<String>, StoreError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(text)) => Ok(Some(text)),
        Some(Value::Blob(bytes)) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StoreError::NonTextValue {
                key: key.to_string(),
            }),
        Some(_) => Err(StoreError::NonTextValue {
            key: key.to_string(),
        }),
    }
}

/// メモリ上のストア（非アトミック）
///
/// dry run と、SQLite を使わないテストで使う。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStateStore {
    rows: BTreeMap<String, String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在の全行
    pub fn rows(&self) -> &BTreeMap<String, String> {
        &self.rows
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStateStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MemoryStateStore {
            rows: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.rows.get(key).cloned())
    }

    fn upsert(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.rows.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
