use bollard::models::CreateImageInfo;
use bollard::query_parameters::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;

use super::map_docker_error;
use crate::error::{Error, Result};

/// Parse an image reference into (name, tag). The tag may be a digest,
/// which the engine accepts in the same place.
/// "postgres:16" -> ("postgres", "16")
/// "redis" -> ("redis", "latest")
/// "localhost:5000/app" -> ("localhost:5000/app", "latest")
/// "app@sha256:abc" -> ("app", "sha256:abc")
pub fn parse_image_ref(image: &str) -> (&str, &str) {
    if let Some((name, digest)) = image.split_once('@') {
        if !name.is_empty() && !digest.is_empty() {
            return (name, digest);
        }
    }
    match image.rsplit_once(':') {
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains('/') => {
            (name, tag)
        }
        _ => (image, "latest"),
    }
}

/// Check if an image exists locally.
pub async fn check_image_exists(docker: &Docker, image: &str) -> Result<bool> {
    match docker.inspect_image(image).await {
        Ok(_) => Ok(true),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(false),
        Err(e) => Err(map_docker_error(e, "image", image)),
    }
}

/// Pull a single Docker image, draining the progress stream.
pub async fn pull_image(docker: &Docker, image: &str) -> Result<()> {
    let (name, tag) = parse_image_ref(image);
    tracing::info!(image = %image, "pulling image");

    let options = CreateImageOptions {
        from_image: Some(name.to_string()),
        tag: Some(tag.to_string()),
        ..Default::default()
    };

    let mut stream = docker.create_image(Some(options), None, None);
    while let Some(result) = stream.next().await {
        let info: CreateImageInfo = result.map_err(|e| map_docker_error(e, "image", image))?;
        if let Some(err) = &info.error_detail {
            return Err(Error::external(
                "docker",
                None,
                format!("image pull failed for {}: {:?}", image, err),
            ));
        }
    }

    tracing::debug!(image = %image, "image pulled successfully");
    Ok(())
}
