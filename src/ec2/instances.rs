//! Instance launch, lookup and termination.

use aws_sdk_ec2::types::{Filter, Instance, InstanceType, ResourceType, Tag, TagSpecification};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::Ec2ControlPlane;
use super::error::classify;
use crate::provider::{
    ComputeInstance, InstanceSelector, InstanceState, LaunchSpec, ProviderError,
    ProviderErrorKind,
};

impl Ec2ControlPlane {
    pub(super) async fn launch(
        &self,
        spec: &LaunchSpec,
        client_token: &str,
    ) -> Result<ComputeInstance, ProviderError> {
        let tags = spec
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect();
        let output = self
            .client
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_shape.as_str()))
            .key_name(&spec.key_name)
            .set_security_group_ids(Some(spec.rule_set_ids.clone()))
            .user_data(STANDARD.encode(spec.bootstrap.as_str()))
            .min_count(1)
            .max_count(1)
            .client_token(client_token)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| classify("RunInstances", &err))?;
        output
            .instances()
            .first()
            .and_then(compute_instance)
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Other,
                    "RunInstances",
                    "response carried no instance",
                )
            })
    }

    pub(super) async fn fetch_instance(
        &self,
        id: &str,
    ) -> Result<Option<ComputeInstance>, ProviderError> {
        let result = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|err| classify("DescribeInstances", &err));
        match result {
            Ok(output) => Ok(output
                .reservations()
                .iter()
                .flat_map(|reservation| reservation.instances())
                .filter_map(compute_instance)
                .find(|instance| instance.id == id)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(super) async fn fetch_instances(
        &self,
        selector: &InstanceSelector,
    ) -> Result<Vec<ComputeInstance>, ProviderError> {
        let filters = selector_filters(selector);
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_instances()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| classify("DescribeInstances", &err))?;
            instances.extend(
                output
                    .reservations()
                    .iter()
                    .flat_map(|reservation| reservation.instances())
                    .filter_map(compute_instance),
            );
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }
        Ok(instances)
    }

    pub(super) async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, ProviderError> {
        let output = self
            .client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|err| classify("TerminateInstances", &err))?;
        Ok(output
            .terminating_instances()
            .iter()
            .filter_map(|change| change.instance_id().map(str::to_owned))
            .collect())
    }
}

fn selector_filters(selector: &InstanceSelector) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(shape) = &selector.instance_shape {
        filters.push(Filter::builder().name("instance-type").values(shape).build());
    }
    if let Some(key) = &selector.key_name {
        filters.push(Filter::builder().name("key-name").values(key).build());
    }
    if !selector.states.is_empty() {
        filters.push(
            Filter::builder()
                .name("instance-state-name")
                .set_values(Some(
                    selector
                        .states
                        .iter()
                        .map(|state| state.as_str().to_owned())
                        .collect(),
                ))
                .build(),
        );
    }
    for (key, value) in &selector.tags {
        filters.push(
            Filter::builder()
                .name(format!("tag:{key}"))
                .values(value)
                .build(),
        );
    }
    filters
}

fn compute_instance(instance: &Instance) -> Option<ComputeInstance> {
    let id = instance.instance_id()?.to_owned();
    let state = instance
        .state()
        .and_then(|state| state.name())
        .map_or_else(
            || InstanceState::Other(String::from("unknown")),
            |name| InstanceState::from(name.as_str()),
        );
    Some(ComputeInstance {
        id,
        state,
        public_address: instance
            .public_ip_address()
            .and_then(|address| address.parse().ok()),
        instance_shape: instance
            .instance_type()
            .map(|shape| shape.as_str().to_owned())
            .unwrap_or_default(),
        key_name: instance.key_name().map(str::to_owned),
        tags: instance
            .tags()
            .iter()
            .filter_map(|tag| {
                Some((
                    tag.key()?.to_owned(),
                    tag.value().unwrap_or_default().to_owned(),
                ))
            })
            .collect(),
    })
}
