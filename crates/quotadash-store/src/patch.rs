//! クレデンシャルの書き換え
//!
//! 処理フロー:
//! 1. クレデンシャルキーの値を読む（無ければ空メッセージ）
//! 2. Base64 デコード
//! 3. 対象フィールドをすべて除去（他のフィールドはバイト単位で保持）
//! 4. 新しいクレデンシャルフィールドを末尾に追加
//! 5. Base64 エンコードして書き戻し、オンボーディング済みフラグも書く
//!
//! ホストはストアを起動時にしか読まないため、成功後はホストの再起動が必要。

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quotadash_wire::{
    build_credential_field, check_field_number, decode_credential, find_field,
    remove_field_counted, Credential,
};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::locate::StoreLocator;
use crate::store::{SqliteStateStore, StateStore};

/// クレデンシャルを格納するキー
pub const CREDENTIAL_KEY: &str = "jetskiStateSync.agentManagerInitState";
/// 初回オンボーディングを抑止するフラグのキー
pub const ONBOARDING_KEY: &str = "antigravityOnboarding";
/// オンボーディングフラグに書く値
pub const ONBOARDING_DONE: &str = "true";
/// トップレベルメッセージ中のクレデンシャルのフィールド番号
pub const CREDENTIAL_FIELD: u32 = 6;

/// 書き換え対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTarget {
    pub credential_key: String,
    pub onboarding_key: String,
    pub field_number: u32,
}

impl Default for PatchTarget {
    fn default() -> Self {
        PatchTarget {
            credential_key: CREDENTIAL_KEY.to_string(),
            onboarding_key: ONBOARDING_KEY.to_string(),
            field_number: CREDENTIAL_FIELD,
        }
    }
}

/// パッチ結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// 書き換え前のメッセージ長（バイト）
    pub previous_len: usize,
    /// 書き換え後のメッセージ長（バイト）
    pub patched_len: usize,
    /// 取り除いた旧クレデンシャルフィールドの数
    pub removed_fields: usize,
    /// オンボーディングフラグを書けたか
    ///
    /// アトミックなストアでは常に `true`。非アトミックなストアでフラグの書き込みだけが
    /// 失敗した場合は `false`（クレデンシャルは書き込み済み）。
    pub onboarding_written: bool,
}

/// ストアのクレデンシャルを書き換える
///
/// 書き込みの前に失敗した場合、ストアは一切変更されない。アトミックなストアでは
/// 読み取りから 2 キーの書き込みまでを 1 トランザクションで行う。
///
/// # エラー
/// - `StoreError::Wire`: フィールド番号が範囲外、または保存メッセージの wire format が壊れている
/// - `StoreError::InvalidBase64` / `StoreError::NonTextValue`: 保存値が読めない
/// - `StoreError::StoreIo`: 読み書きに失敗
#[instrument(skip_all, fields(key = %target.credential_key, field = target.field_number))]
pub fn patch_credential<S>(
    store: &mut S,
    target: &PatchTarget,
    credential: &Credential,
) -> Result<PatchOutcome, StoreError>
where
    S: StateStore + ?Sized,
{
    check_field_number(u64::from(target.field_number), 0)?;

    let outcome = if store.is_atomic() {
        let mut outcome = PatchOutcome::default();
        store.read_modify_write(
            &target.credential_key,
            &mut |current: Option<String>| -> Result<Vec<(String, String)>, StoreError> {
                let (encoded, rewritten) = rewrite(target, credential, current.as_deref())?;
                outcome = rewritten;
                Ok(vec![
                    (target.credential_key.clone(), encoded),
                    (target.onboarding_key.clone(), ONBOARDING_DONE.to_string()),
                ])
            },
        )?;
        PatchOutcome {
            onboarding_written: true,
            ..outcome
        }
    } else {
        let current = store.get(&target.credential_key)?;
        let (encoded, outcome) = rewrite(target, credential, current.as_deref())?;

        // クレデンシャルを先に書く。こちらが正となる状態
        store.upsert(&target.credential_key, &encoded)?;
        let onboarding_written = match store.upsert(&target.onboarding_key, ONBOARDING_DONE) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    onboarding_key = %target.onboarding_key,
                    error = %err,
                    "credential written but onboarding flag write failed"
                );
                false
            }
        };
        PatchOutcome {
            onboarding_written,
            ..outcome
        }
    };

    info!(
        patched_len = outcome.patched_len,
        removed_fields = outcome.removed_fields,
        onboarding_written = outcome.onboarding_written,
        "credential patched"
    );
    Ok(outcome)
}

/// 保存値から書き戻す Base64 テキストを作る（`onboarding_written` は呼び出し側で決める）
fn rewrite(
    target: &PatchTarget,
    credential: &Credential,
    current: Option<&str>,
) -> Result<(String, PatchOutcome), StoreError> {
    let current = decode_message(&target.credential_key, current)?;
    let (mut message, removed_fields) = remove_field_counted(&current, target.field_number)?;
    debug!(
        previous_len = current.len(),
        kept_len = message.len(),
        removed_fields,
        "old credential field stripped"
    );

    message.extend_from_slice(&build_credential_field(target.field_number, credential));
    let outcome = PatchOutcome {
        previous_len: current.len(),
        patched_len: message.len(),
        removed_fields,
        onboarding_written: false,
    };
    Ok((STANDARD.encode(&message), outcome))
}

/// 現在保存されているクレデンシャルを読む
///
/// キーが無い、または対象フィールドが無い場合は `None`。
pub fn read_credential<S>(store: &S, target: &PatchTarget) -> Result<Option<Credential>, StoreError>
where
    S: StateStore + ?Sized,
{
    check_field_number(u64::from(target.field_number), 0)?;
    let current = store.get(&target.credential_key)?;
    let message = decode_message(&target.credential_key, current.as_deref())?;
    match find_field(&message, target.field_number)? {
        Some(payload) => Ok(Some(decode_credential(payload)?)),
        None => Ok(None),
    }
}

/// 探索 → オープン → パッチをまとめて行う
///
/// # 戻り値
/// `(使ったストアのパス, パッチ結果)`
pub fn open_and_patch(
    locator: &StoreLocator,
    target: &PatchTarget,
    credential: &Credential,
) -> Result<(PathBuf, PatchOutcome), StoreError> {
    let path = locator.resolve()?;
    let mut store = SqliteStateStore::open(&path)?;
    let outcome = patch_credential(&mut store, target, credential)?;
    Ok((path, outcome))
}

/// 保存値を Base64 デコードしたメッセージ（値が無ければ空）
fn decode_message(key: &str, value: Option<&str>) -> Result<Vec<u8>, StoreError> {
    match value {
        None => Ok(Vec::new()),
        Some(text) => STANDARD
            .decode(text.as_bytes())
            .map_err(|source| StoreError::InvalidBase64 {
                key: key.to_string(),
                source,
            }),
    }
}
