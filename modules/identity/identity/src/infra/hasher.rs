//! PBKDF2-SHA256 realization of the credential-hashing capability.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use identity_sdk::{CredentialRecord, StorageType};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::config::HashingConfig;
use crate::domain::ports::{CredentialHasher, HashError};

const ALGORITHM: &str = "PBKDF2-SHA256";
const SALT_LENGTH: usize = 16;

pub struct Pbkdf2Hasher {
    iterations: u32,
    key_length: u32,
}

impl Pbkdf2Hasher {
    #[must_use]
    pub fn from_config(config: &HashingConfig) -> Self {
        Self {
            iterations: config.iterations,
            key_length: config.key_length,
        }
    }

    fn derive(&self, plain: &str, salt: &[u8], iterations: u32, key_length: u32) -> Vec<u8> {
        let mut digest = vec![0u8; key_length as usize];
        pbkdf2_hmac::<Sha256>(plain.as_bytes(), salt, iterations, &mut digest);
        digest
    }
}

impl CredentialHasher for Pbkdf2Hasher {
    fn hash(&self, plain: &str) -> Result<CredentialRecord, HashError> {
        let mut salt = [0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        let digest = self.derive(plain, &salt, self.iterations, self.key_length);
        Ok(CredentialRecord {
            storage_type: StorageType::Hash,
            algorithm: Some(ALGORITHM.to_owned()),
            iterations: Some(self.iterations),
            key_length: Some(self.key_length),
            salt: Some(BASE64.encode(salt)),
            value: BASE64.encode(digest),
        })
    }

    fn verify(&self, plain: &str, record: &CredentialRecord) -> Result<bool, HashError> {
        if record.algorithm.as_deref() != Some(ALGORITHM) {
            return Err(HashError::new(format!(
                "unsupported hash algorithm '{}'",
                record.algorithm.as_deref().unwrap_or("<missing>")
            )));
        }
        let salt = record
            .salt
            .as_deref()
            .ok_or_else(|| HashError::new("record is missing its salt"))?;
        let salt = BASE64
            .decode(salt)
            .map_err(|e| HashError::new(format!("malformed salt: {e}")))?;
        let iterations = record
            .iterations
            .ok_or_else(|| HashError::new("record is missing its iteration count"))?;
        let key_length = record
            .key_length
            .ok_or_else(|| HashError::new("record is missing its key length"))?;

        let digest = self.derive(plain, &salt, iterations, key_length);
        Ok(BASE64.encode(digest) == record.value)
    }
}
