use clap::Args;

use common::prelude::SecretKey;

/// Print a fresh identity without touching the config directory.
#[derive(Args, Debug, Clone)]
pub struct Keygen;

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("key generation failed: {0}")]
    Crypto(#[from] common::crypto::CryptoError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let secret = SecretKey::generate()?;
        Ok(format!(
            "private key: {}\npublic key:  {}",
            secret.to_hex(),
            secret.public().to_hex()
        ))
    }
}
