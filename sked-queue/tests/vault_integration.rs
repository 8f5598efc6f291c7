//! Integration tests for sked-queue keygen and seal

mod common;

use common::setup_test_env;
use libskedcast::vault::TokenCipher;
use predicates::prelude::*;
use secrecy::ExposeSecret;
use std::fs;

#[test]
fn test_keygen_prints_identity_and_public_key() {
    let output = assert_cmd::Command::cargo_bin("sked-queue")
        .unwrap()
        .env_remove("SKEDCAST_CONFIG")
        .arg("keygen")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines();
    assert!(lines.next().unwrap().starts_with("# public key: age1"));
    let identity = lines.next().unwrap();
    assert!(TokenCipher::from_identity_str(identity).is_ok());
}

#[tokio::test]
async fn test_seal_round_trips_with_configured_identity() {
    let env = setup_test_env().await;

    let output = env
        .cmd()
        .arg("seal")
        .write_stdin("EAAB-page-token\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let sealed = String::from_utf8(output.stdout).unwrap();
    let cipher = TokenCipher::from_identity_str(&env.identity).unwrap();
    let opened = cipher.open(sealed.trim()).unwrap();
    assert_eq!(opened.expose_secret(), "EAAB-page-token");
}

#[tokio::test]
async fn test_seal_reads_identity_file() {
    let env = setup_test_env().await;
    let key_path = env.temp_dir.path().join("vault.key");
    fs::write(&key_path, format!("# created for tests\n{}\n", env.identity)).unwrap();
    let mut config = fs::read_to_string(&env.config_path).unwrap();
    config.push_str(&format!(
        "\n[vault]\nidentity_file = \"{}\"\n",
        key_path.display().to_string().replace('\\', "/")
    ));
    fs::write(&env.config_path, config).unwrap();

    env.cmd()
        .env_remove("SKEDCAST_VAULT_IDENTITY")
        .arg("seal")
        .write_stdin("token")
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[tokio::test]
async fn test_seal_rejects_empty_input() {
    let env = setup_test_env().await;

    env.cmd()
        .arg("seal")
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No token on stdin"));
}
