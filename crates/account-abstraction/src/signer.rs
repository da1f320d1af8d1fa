//! Hashes an operation through the entry point and signs it with a session key.
use crate::entry_point::EntryPointApi;
use alloy_primitives::{B256, Bytes};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use ballot_core::{
    ContractAddressSet, SessionKeyCredential, SignError, SignedUserOperation, UserOperation,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// How the 32-byte operation digest is turned into a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureScheme {
    /// EIP-191 `personal_sign` over the digest bytes.
    #[default]
    PersonalMessage,
    /// Bare secp256k1 signature over the digest.
    RawDigest,
}

impl FromStr for SignatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal-message" | "personal" | "eip191" => Ok(Self::PersonalMessage),
            "raw-digest" | "raw" => Ok(Self::RawDigest),
            other => Err(format!("unknown signature scheme '{other}'")),
        }
    }
}

/// Produce a signed operation. Fails without calling the entry point when the
/// credential is expired at `now_ms` or bound to another wallet.
pub async fn hash_and_sign<E>(
    entry_point: &E,
    addresses: &ContractAddressSet,
    op: UserOperation,
    credential: &SessionKeyCredential,
    scheme: SignatureScheme,
    now_ms: u64,
) -> Result<SignedUserOperation, SignError>
where
    E: EntryPointApi + ?Sized,
{
    if credential.is_expired_at(now_ms) {
        return Err(SignError::CredentialExpired {
            expires_at: credential.expires_at,
        });
    }
    if credential.scw_address != op.sender {
        return Err(SignError::WrongWallet {
            expected: op.sender,
        });
    }

    let digest = entry_point
        .get_user_op_hash(addresses.entry_point, &op)
        .await
        .map_err(|e| SignError::HashCall(e.to_string()))?;

    let signature = sign_digest(credential, digest, scheme)?;
    debug!(
        message = "Signed user operation",
        sender = %op.sender,
        nonce = %op.nonce,
        hash = %digest,
        scheme = ?scheme
    );
    Ok(op.into_signed(digest, signature))
}

/// 65-byte `r || s || v` signature with `v` in {27, 28}.
pub fn sign_digest(
    credential: &SessionKeyCredential,
    digest: B256,
    scheme: SignatureScheme,
) -> Result<Bytes, SignError> {
    let signer = PrivateKeySigner::from_bytes(credential.signing_material.secret())
        .map_err(|e| SignError::Signer(e.to_string()))?;

    let signature = match scheme {
        SignatureScheme::PersonalMessage => signer.sign_message_sync(digest.as_slice()),
        SignatureScheme::RawDigest => signer.sign_hash_sync(&digest),
    }
    .map_err(|e| SignError::Signer(e.to_string()))?;

    Ok(Bytes::copy_from_slice(&signature.as_bytes()))
}
