//! Image discovery.

use aws_sdk_ec2::types::{Filter, Image};

use super::Ec2ControlPlane;
use super::error::classify;
use crate::provider::{BootImage, ImageFilter, ProviderError};

impl Ec2ControlPlane {
    pub(super) async fn fetch_images(
        &self,
        filter: &ImageFilter,
    ) -> Result<Vec<BootImage>, ProviderError> {
        let output = self
            .client
            .describe_images()
            .owners(&filter.owner_id)
            .filters(
                Filter::builder()
                    .name("name")
                    .values(&filter.name_pattern)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("architecture")
                    .values(&filter.architecture)
                    .build(),
            )
            .filters(Filter::builder().name("state").values("available").build())
            .include_deprecated(false)
            .send()
            .await
            .map_err(|err| classify("DescribeImages", &err))?;
        Ok(output.images().iter().filter_map(boot_image).collect())
    }
}

fn boot_image(image: &Image) -> Option<BootImage> {
    Some(BootImage {
        image_id: image.image_id()?.to_owned(),
        name: image.name().unwrap_or_default().to_owned(),
        creation_timestamp: image.creation_date().unwrap_or_default().to_owned(),
        owner_id: image.owner_id().unwrap_or_default().to_owned(),
    })
}
