//! Thin wrappers around the `age` command-line tool and its YubiKey plugin.
//!
//! The bundle format never implements the encryption itself: it always
//! shells out, the same way the original tooling does, so that a bundle
//! produced here stays decryptable with the stock `age` client.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::Error;

fn run(args: &[&str], stdin_data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut child = Command::new("age")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Subprocess(format!("failed to spawn age: {e}")))?;
    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(stdin_data)?;
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(Error::Subprocess(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(output.stdout)
}

/// Encrypts `plaintext` for `recipient` (an `age1...` public key), producing
/// binary ciphertext suitable for storing as a zip entry.
pub fn encrypt(recipient: &str, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    run(&["-r", recipient], plaintext)
}

/// Like [`encrypt`], but produces ASCII-armored ciphertext, for embedding in
/// the YAML manifest as a decryption key share.
pub fn encrypt_armored(recipient: &str, plaintext: &[u8]) -> Result<String, Error> {
    let bytes = run(&["-a", "-r", recipient], plaintext)?;
    String::from_utf8(bytes).map_err(|e| Error::Subprocess(e.to_string()))
}

/// Decrypts `ciphertext` with a secret key (`AGE-SECRET-KEY-1...`) or a
/// YubiKey plugin identity string, written out to a transient identity file
/// because `age` only accepts identities from a file.
pub fn decrypt(identity: &str, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let mut identity_file = tempfile::NamedTempFile::new()?;
    identity_file.write_all(identity.as_bytes())?;
    identity_file.flush()?;
    decrypt_with_identity_file(identity_file.path(), ciphertext)
}

/// Decrypts with an identity already materialized as a file on disk (e.g. a
/// YubiKey plugin identity persisted next to the bundle).
pub fn decrypt_with_identity_file(
    identity_path: &std::path::Path,
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let path = identity_path
        .to_str()
        .ok_or_else(|| Error::Subprocess("identity path is not valid UTF-8".to_string()))?;
    let stderr_marker = "no identity matched";
    match run(&["-d", "-i", path], ciphertext) {
        Ok(bytes) => Ok(bytes),
        Err(Error::Subprocess(message)) if message.to_lowercase().contains(stderr_marker) => {
            Err(Error::WrongDecryptionKey)
        }
        Err(other) => Err(other),
    }
}

/// Generates a fresh `age` keypair via `age-keygen`, returning
/// `(public_key, secret_key)`.
pub fn generate_keypair() -> Result<(String, String), Error> {
    let output = Command::new("age-keygen")
        .output()
        .map_err(|e| Error::Subprocess(format!("failed to spawn age-keygen: {e}")))?;
    if !output.status.success() {
        return Err(Error::Subprocess(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let secret_key = stdout
        .lines()
        .find(|line| line.starts_with("AGE-SECRET-KEY-"))
        .ok_or_else(|| Error::Subprocess("age-keygen produced no secret key".to_string()))?
        .trim()
        .to_string();
    let public_key = stdout
        .lines()
        .find_map(|line| line.strip_prefix("# public key: "))
        .or_else(|| stdout.lines().find_map(|line| line.strip_prefix("Public key: ")))
        .ok_or_else(|| Error::Subprocess("age-keygen produced no public key".to_string()))?
        .trim()
        .to_string();
    Ok((public_key, secret_key))
}

/// One hardware identity discovered via `age-plugin-yubikey --identity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YubikeyIdentity {
    /// Human-readable label, e.g. the serial/slot comment line.
    pub label: String,
    /// The `AGE-PLUGIN-YUBIKEY-...` identity string itself.
    pub identity: String,
}

/// Lists the YubiKey identities visible to `age-plugin-yubikey` on this
/// machine. Requires the plugin binary to be installed and a key inserted.
pub fn list_yubikey_identities() -> Result<Vec<YubikeyIdentity>, Error> {
    let output = Command::new("age-plugin-yubikey")
        .arg("--identity")
        .output()
        .map_err(|e| Error::Subprocess(format!("failed to spawn age-plugin-yubikey: {e}")))?;
    if !output.status.success() {
        return Err(Error::Subprocess(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut identities = Vec::new();
    let mut pending_label: Option<String> = None;
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            pending_label = Some(comment.trim().to_string());
        } else if line.starts_with("AGE-PLUGIN-YUBIKEY-") {
            identities.push(YubikeyIdentity {
                label: pending_label.take().unwrap_or_else(|| line.to_string()),
                identity: line.to_string(),
            });
        }
    }
    Ok(identities)
}
