//! Boot image resolution across an ordered distribution chain.

use thiserror::Error;
use tracing::{debug, info};

use crate::fallback::{FallbackError, Verdict, try_in_order};
use crate::provider::{BootImage, ControlPlane, ImageFilter, ProviderError};

/// Errors raised while resolving a boot image.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ImageError {
    /// No filter in the chain matched any available image.
    #[error("no boot image found in {region} (tried: {tried})")]
    NotFound {
        /// Region that was searched.
        region: String,
        /// Comma-separated labels of the filters that were tried.
        tried: String,
    },
    /// Raised when the image query itself fails.
    #[error("image lookup for {label} failed: {source}")]
    Provider {
        /// Label of the filter being queried.
        label: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
}

/// Default fallback chain: Debian 12, then Ubuntu 22.04.
#[must_use]
pub fn default_image_chain() -> Vec<ImageFilter> {
    vec![ImageFilter::debian_12(), ImageFilter::ubuntu_22_04()]
}

/// Ubuntu 22.04 only, for instances whose login includes the `ubuntu` user.
#[must_use]
pub fn ubuntu_image_chain() -> Vec<ImageFilter> {
    vec![ImageFilter::ubuntu_22_04()]
}

/// Resolves the newest image of the first filter with any match.
///
/// Later filters are never consulted once an earlier one matches, even if
/// they hold newer images.
///
/// # Errors
///
/// Returns [`ImageError::NotFound`] when every filter comes back empty
/// (including an empty chain) and [`ImageError::Provider`] as soon as a query
/// fails.
pub async fn resolve<P: ControlPlane + ?Sized>(
    plane: &P,
    chain: &[ImageFilter],
) -> Result<BootImage, ImageError> {
    let region = plane.region().code().to_owned();
    let region_code = region.as_str();
    let outcome = try_in_order(
        chain,
        |filter| async move {
            let images = plane
                .describe_images(filter)
                .await
                .map_err(|source| ImageError::Provider {
                    label: filter.label.clone(),
                    source,
                })?;
            debug!(label = %filter.label, candidates = images.len(), "queried boot images");
            newest(images).ok_or_else(|| ImageError::NotFound {
                region: region_code.to_owned(),
                tried: filter.label.clone(),
            })
        },
        |err| match err {
            ImageError::NotFound { .. } => Verdict::Advance,
            ImageError::Provider { .. } => Verdict::Abort,
        },
    )
    .await;

    match outcome {
        Ok((filter, image)) => {
            info!(
                region = %region,
                label = %filter.label,
                image_id = %image.image_id,
                name = %image.name,
                "resolved boot image"
            );
            Ok(image)
        }
        Err(FallbackError::Aborted { attempt, .. }) => Err(attempt.error),
        Err(FallbackError::Exhausted(attempts)) => Err(ImageError::NotFound {
            tried: attempts
                .iter()
                .map(|attempt| attempt.candidate.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            region,
        }),
    }
}

fn newest(images: Vec<BootImage>) -> Option<BootImage> {
    images
        .into_iter()
        .max_by(|left, right| left.creation_timestamp.cmp(&right.creation_timestamp))
}
