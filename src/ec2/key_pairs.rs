//! Key pairs.

use super::Ec2ControlPlane;
use super::error::classify;
use crate::provider::{AccessKeyPair, ProviderError};

impl Ec2ControlPlane {
    pub(super) async fn create_key(&self, name: &str) -> Result<AccessKeyPair, ProviderError> {
        let output = self
            .client
            .create_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|err| classify("CreateKeyPair", &err))?;
        Ok(AccessKeyPair {
            name: output.key_name().unwrap_or(name).to_owned(),
            private_key_material: output.key_material().map(str::to_owned),
        })
    }

    pub(super) async fn describe_key(
        &self,
        name: &str,
    ) -> Result<Option<AccessKeyPair>, ProviderError> {
        let result = self
            .client
            .describe_key_pairs()
            .key_names(name)
            .send()
            .await
            .map_err(|err| classify("DescribeKeyPairs", &err));
        match result {
            Ok(output) => Ok(output.key_pairs().first().map(|info| AccessKeyPair {
                name: info.key_name().unwrap_or(name).to_owned(),
                private_key_material: None,
            })),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(super) async fn delete_key(&self, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|err| classify("DeleteKeyPair", &err))?;
        Ok(())
    }
}
