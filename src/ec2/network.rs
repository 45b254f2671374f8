//! Networks and security groups.

use aws_sdk_ec2::types::{Filter, IpPermission, IpRange};
use tracing::debug;

use super::Ec2ControlPlane;
use super::error::classify;
use crate::provider::{Network, ProviderError, ProviderErrorKind, RuleSetRequest};

impl Ec2ControlPlane {
    pub(super) async fn fetch_networks(&self) -> Result<Vec<Network>, ProviderError> {
        let output = self
            .client
            .describe_vpcs()
            .send()
            .await
            .map_err(|err| classify("DescribeVpcs", &err))?;
        Ok(output
            .vpcs()
            .iter()
            .filter_map(|vpc| {
                vpc.vpc_id().map(|id| Network {
                    id: id.to_owned(),
                    is_default: vpc.is_default().unwrap_or(false),
                })
            })
            .collect())
    }

    pub(super) async fn create_security_group(
        &self,
        request: &RuleSetRequest,
    ) -> Result<String, ProviderError> {
        let created = self
            .client
            .create_security_group()
            .group_name(&request.name)
            .description(&request.description)
            .vpc_id(&request.network_id)
            .send()
            .await
            .map_err(|err| classify("CreateSecurityGroup", &err))?;
        let group_id = created.group_id().map(str::to_owned).ok_or_else(|| {
            ProviderError::new(
                ProviderErrorKind::Other,
                "CreateSecurityGroup",
                "response carried no group id",
            )
        })?;

        if request.rules.is_empty() {
            return Ok(group_id);
        }
        let permissions = request
            .rules
            .iter()
            .map(|rule| {
                IpPermission::builder()
                    .ip_protocol(&rule.protocol)
                    .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr).build())
                    .build()
            })
            .collect();
        match self
            .client
            .authorize_security_group_ingress()
            .group_id(&group_id)
            .set_ip_permissions(Some(permissions))
            .send()
            .await
            .map_err(|err| classify("AuthorizeSecurityGroupIngress", &err))
        {
            Ok(_) => Ok(group_id),
            Err(err) if err.is_conflict() => {
                debug!(group_id = %group_id, "ingress rules already present");
                Ok(group_id)
            }
            Err(err) => Err(err),
        }
    }

    pub(super) async fn find_security_group(
        &self,
        name: &str,
        network_id: &str,
    ) -> Result<Option<String>, ProviderError> {
        let output = self
            .client
            .describe_security_groups()
            .filters(Filter::builder().name("group-name").values(name).build())
            .filters(Filter::builder().name("vpc-id").values(network_id).build())
            .send()
            .await
            .map_err(|err| classify("DescribeSecurityGroups", &err))?;
        Ok(output
            .security_groups()
            .first()
            .and_then(|group| group.group_id())
            .map(str::to_owned))
    }
}
