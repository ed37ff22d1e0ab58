//! Signature provider contract (§6, external interface #3): "A collaborator
//! implementing `{ sign(signerId, digest) -> signature, publicKey(signerId)
//! -> bytes, verify(pubkey, digest, sig) -> bool }`. The core never owns
//! private keys."
//!
//! [`DilithiumKeyStore`] is a reference implementation suitable for tests
//! and single-process demos (`xln-node`); a production deployment would
//! swap in an HSM- or remote-signer-backed implementation of the same
//! trait without touching `xln-account`/`xln-entity`.

use std::collections::HashMap;

use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey as PqPublicKey, SecretKey as PqSecretKey};
use thiserror::Error;
use xln_core::{PublicKey, SignerId, Signature};
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unknown signer: {0}")]
    UnknownSigner(SignerId),
    #[error("invalid public key encoding")]
    InvalidPublicKey,
}

/// The contract every board-member keyholder implements (§6 contract #3).
pub trait SignatureProvider {
    fn sign(&self, signer_id: &SignerId, digest: &[u8]) -> Result<Signature, SignatureError>;
    fn public_key(&self, signer_id: &SignerId) -> Result<PublicKey, SignatureError>;
    fn verify(pubkey: &PublicKey, digest: &[u8], sig: &Signature) -> bool
    where
        Self: Sized;
}

struct Keypair {
    public_key: Vec<u8>,
    secret_key: Zeroizing<Vec<u8>>,
}

/// An in-process store of Dilithium2 keypairs, one per signer. Reference
/// implementation of [`SignatureProvider`] — not a production key custody
/// design (no HSM, no remote signer).
#[derive(Default)]
pub struct DilithiumKeyStore {
    keys: HashMap<SignerId, Keypair>,
}

impl DilithiumKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and register a fresh keypair for `signer_id`.
    pub fn generate(&mut self, signer_id: SignerId) -> &mut Self {
        let (pk, sk) = dilithium2::keypair();
        self.keys.insert(
            signer_id,
            Keypair {
                public_key: pk.as_bytes().to_vec(),
                secret_key: Zeroizing::new(sk.as_bytes().to_vec()),
            },
        );
        self
    }
}

impl SignatureProvider for DilithiumKeyStore {
    fn sign(&self, signer_id: &SignerId, digest: &[u8]) -> Result<Signature, SignatureError> {
        let kp = self
            .keys
            .get(signer_id)
            .ok_or_else(|| SignatureError::UnknownSigner(signer_id.clone()))?;
        let sk = dilithium2::SecretKey::from_bytes(&kp.secret_key)
            .map_err(|_| SignatureError::InvalidSignature)?;
        let sig = dilithium2::detached_sign(digest, &sk);
        Ok(Signature(sig.as_bytes().to_vec()))
    }

    fn public_key(&self, signer_id: &SignerId) -> Result<PublicKey, SignatureError> {
        self.keys
            .get(signer_id)
            .map(|kp| PublicKey(kp.public_key.clone()))
            .ok_or_else(|| SignatureError::UnknownSigner(signer_id.clone()))
    }

    fn verify(pubkey: &PublicKey, digest: &[u8], sig: &Signature) -> bool {
        let Ok(pk) = dilithium2::PublicKey::from_bytes(&pubkey.0) else {
            return false;
        };
        let Ok(detached) = dilithium2::DetachedSignature::from_bytes(&sig.0) else {
            return false;
        };
        dilithium2::verify_detached_signature(&detached, digest, &pk).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let mut store = DilithiumKeyStore::new();
        let alice = SignerId("alice".into());
        store.generate(alice.clone());

        let digest = b"frame digest";
        let sig = store.sign(&alice, digest).unwrap();
        let pk = store.public_key(&alice).unwrap();
        assert!(DilithiumKeyStore::verify(&pk, digest, &sig));
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let mut store = DilithiumKeyStore::new();
        let bob = SignerId("bob".into());
        store.generate(bob.clone());

        let sig = store.sign(&bob, b"original").unwrap();
        let pk = store.public_key(&bob).unwrap();
        assert!(!DilithiumKeyStore::verify(&pk, b"tampered", &sig));
    }

    #[test]
    fn unknown_signer_errors() {
        let store = DilithiumKeyStore::new();
        let ghost = SignerId("ghost".into());
        assert!(matches!(
            store.sign(&ghost, b"x"),
            Err(SignatureError::UnknownSigner(_))
        ));
    }
}
