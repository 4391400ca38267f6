//! Ed25519 message signing and verification.
//!
//! Every signed masternode message (broadcast, ping, payment vote,
//! verification) is reduced to a byte string first and then signed here.

use crate::error::CryptoError;
use lmnode_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    let sig = signing_key.sign(message);
    Signature(sig.to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
/// Non-canonical signatures are rejected.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &dalek_sig).is_ok()
}

/// `verify_signature` as a `Result`, for call sites that propagate with `?`.
pub fn check_signature(
    message: &[u8],
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), CryptoError> {
    if verify_signature(message, signature, public_key) {
        Ok(())
    } else {
        Err(CryptoError::BadSignature(hex::encode(&public_key.0[..8])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let msg = b"203.0.113.5:28878 1700000000";
        let sig = sign_message(msg, &kp.private);
        assert!(verify_signature(msg, &sig, &kp.public));
        assert!(check_signature(msg, &sig, &kp.public).is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"correct message", &kp.private);
        assert!(!verify_signature(b"wrong message", &sig, &kp.public));
        assert!(matches!(
            check_signature(b"wrong message", &sig, &kp.public),
            Err(CryptoError::BadSignature(_))
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        let sig = sign_message(b"ping", &kp1.private);
        assert!(!verify_signature(b"ping", &sig, &kp2.public));
    }

    #[test]
    fn empty_signature_never_verifies() {
        let kp = generate_keypair();
        assert!(!verify_signature(b"vote", &Signature::default(), &kp.public));
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair();
        let sig = sign_message(b"test", &kp.private);
        let bad_key = PublicKey([0xFF; 32]);
        assert!(!verify_signature(b"test", &sig, &bad_key));
    }
}
