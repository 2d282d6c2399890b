//! quotadash 統合テスト
//!
//! アカウントファイル → CLI → SQLite ストア の完全なパイプラインをテストする。
//! ホストが書いた `state.vscdb` を一時ディレクトリに再現して使う。

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;
use quotadash_cli::{run, Cli};
use quotadash_store::{SqliteStateStore, StateStore, CREDENTIAL_KEY, ONBOARDING_KEY};
use quotadash_wire::{
    build_credential_field, decode_credential, encode_string_field, field_spans, find_field,
    Credential,
};

// ==============================================================
// ヘルパー: ホストのストアとアカウントファイルを用意する
// ==============================================================

struct Fixture {
    _dir: tempfile::TempDir,
    store: PathBuf,
    account: PathBuf,
}

impl Fixture {
    /// `stored` を Base64 にしてクレデンシャルキーに入れたストアを作る（None ならキー無し）
    fn new(stored: Option<&[u8]>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("User/globalStorage/state.vscdb");
        fs::create_dir_all(store.parent().unwrap()).unwrap();

        let mut db = SqliteStateStore::create(&store).unwrap();
        db.upsert("workbench.unrelated", "{\"untouched\":true}").unwrap();
        if let Some(message) = stored {
            db.upsert(CREDENTIAL_KEY, &STANDARD.encode(message)).unwrap();
        }

        let account = dir.path().join("account.json");
        fs::write(
            &account,
            r#"{
                "email": "user@example.com",
                "token": {
                    "access_token": "ya29.fresh",
                    "refresh_token": "1//fresh-refresh",
                    "expiry_timestamp": 1767225600
                }
            }"#,
        )
        .unwrap();

        Fixture {
            _dir: dir,
            store,
            account,
        }
    }

    /// CLI を実行して標準出力相当の文字列を返す
    fn run(&self, extra: &[&str]) -> anyhow::Result<String> {
        let mut args: Vec<String> = vec!["quotadash".into()];
        args.extend(extra.iter().map(|s| s.to_string()));
        args.push("--store".into());
        args.push(self.store.display().to_string());

        let cli = Cli::try_parse_from(args)?;
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn patch(&self) -> anyhow::Result<String> {
        let account = self.account.display().to_string();
        self.run(&["patch", "--account", &account])
    }

    fn value(&self, key: &str) -> Option<String> {
        SqliteStateStore::open(&self.store).unwrap().get(key).unwrap()
    }

    fn message(&self) -> Vec<u8> {
        STANDARD.decode(self.value(CREDENTIAL_KEY).unwrap()).unwrap()
    }
}

fn fresh_credential() -> Credential {
    Credential {
        access_token: Some("ya29.fresh".to_string()),
        refresh_token: "1//fresh-refresh".to_string(),
        expiry_epoch_seconds: 1_767_225_600,
    }
}

/// [1: "x", 6: <old>, 9: "keep-me"]
fn host_message() -> Vec<u8> {
    let mut old = encode_string_field(1, "ya29.old");
    old.extend(encode_string_field(2, "Bearer"));
    old.extend(encode_string_field(3, "1//old-refresh"));

    let mut message = encode_string_field(1, "x");
    message.extend(quotadash_wire::encode_len_delimited_field(6, &old));
    message.extend(encode_string_field(9, "keep-me"));
    message
}

fn field_numbers(message: &[u8]) -> Vec<u32> {
    field_spans(message)
        .map(|s| s.unwrap().field_number)
        .collect()
}

// ==============================================================
// テスト
// ==============================================================

#[test]
fn test_patch_replaces_credential_and_preserves_other_fields() {
    let fixture = Fixture::new(Some(host_message().as_slice()));

    let out = fixture.patch().unwrap();
    assert!(out.contains("credential written to"));
    assert!(out.contains("Restart Antigravity"));

    let message = fixture.message();
    assert_eq!(field_numbers(&message), vec![1, 9, 6]);

    // field 1 と 9 はバイト単位で同一
    let mut expected = encode_string_field(1, "x");
    expected.extend(encode_string_field(9, "keep-me"));
    expected.extend(build_credential_field(6, &fresh_credential()));
    assert_eq!(message, expected);

    let payload = find_field(&message, 6).unwrap().unwrap();
    assert_eq!(decode_credential(payload).unwrap(), fresh_credential());

    assert_eq!(fixture.value(ONBOARDING_KEY).as_deref(), Some("true"));
    assert_eq!(
        fixture.value("workbench.unrelated").as_deref(),
        Some("{\"untouched\":true}")
    );
}

#[test]
fn test_patch_absent_key_writes_only_new_field() {
    let fixture = Fixture::new(None);

    fixture.patch().unwrap();
    assert_eq!(
        fixture.message(),
        build_credential_field(6, &fresh_credential())
    );
    assert_eq!(fixture.value(ONBOARDING_KEY).as_deref(), Some("true"));
}

#[test]
fn test_patch_group_wire_type_fails_without_writing() {
    let mut corrupt = host_message();
    corrupt.extend_from_slice(&[0x5B, 0x5C]); // field 11 start-group / end-group
    let fixture = Fixture::new(Some(corrupt.as_slice()));
    let before = fixture.value(CREDENTIAL_KEY);

    let err = fixture.patch().unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("unsupported wire type 3"), "{chain}");

    assert_eq!(fixture.value(CREDENTIAL_KEY), before);
    assert_eq!(fixture.value(ONBOARDING_KEY), None);
}

#[test]
fn test_dry_run_writes_nothing() {
    let fixture = Fixture::new(Some(host_message().as_slice()));
    let account = fixture.account.display().to_string();

    let out = fixture
        .run(&["patch", "--account", &account, "--dry-run"])
        .unwrap();
    assert!(out.contains("nothing written"));
    assert!(out.contains("replaced 1 credential field(s)"));

    assert_eq!(fixture.message(), host_message());
    assert_eq!(fixture.value(ONBOARDING_KEY), None);
}

#[test]
fn test_inspect_masks_tokens() {
    let fixture = Fixture::new(Some(host_message().as_slice()));
    fixture.patch().unwrap();

    let out = fixture.run(&["inspect"]).unwrap();
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["onboarding"], "true");
    assert_eq!(report["credential"]["access_token"], "ya29.f...");
    assert_eq!(report["credential"]["refresh_token"], "1//fre...");
    assert_eq!(report["credential"]["expiry_epoch_seconds"], 1_767_225_600u64);
    assert!(!out.contains("fresh-refresh"));
}

#[test]
fn test_missing_store_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere/state.vscdb");
    let account = dir.path().join("account.json");
    fs::write(
        &account,
        r#"{ "token": { "refresh_token": "1//r", "expiry_timestamp": 1 } }"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "quotadash".to_string(),
        "patch".to_string(),
        "--account".to_string(),
        account.display().to_string(),
        "--store".to_string(),
        missing.display().to_string(),
    ])
    .unwrap();
    let err = run(cli, &mut Vec::<u8>::new()).unwrap_err();
    assert!(format!("{err:#}").contains("state store not found"));
    assert!(!missing.exists());
}

#[test]
fn test_config_file_user_data_dir() {
    let fixture = Fixture::new(None);
    // Fixture のストアは <tmp>/User/globalStorage/state.vscdb にある
    let user_data_dir = fixture.store.ancestors().nth(3).unwrap().to_path_buf();
    let config = user_data_dir.join("config.json");
    fs::write(
        &config,
        serde_json::json!({
            "user_data_dir": user_data_dir,
            "fallback_paths": [user_data_dir.join("absent.vscdb")],
        })
        .to_string(),
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "quotadash".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "patch".to_string(),
        "--account".to_string(),
        fixture.account.display().to_string(),
    ])
    .unwrap();
    run(cli, &mut Vec::<u8>::new()).unwrap();

    assert_eq!(
        fixture.message(),
        build_credential_field(6, &fresh_credential())
    );
}

#[test]
fn test_binary_reports_error_with_logging_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_quotadash"))
        .args(["patch", "--account"])
        .arg(&missing)
        .arg("--store")
        .arg(dir.path().join("state.vscdb"))
        .env("RUST_LOG", "off")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("error: "), "{stderr}");
    assert!(stderr.contains("failed to read account file"), "{stderr}");
    assert!(output.stdout.is_empty());
}
