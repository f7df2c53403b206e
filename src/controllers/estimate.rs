use crate::app_error::AppError;
use crate::model::ModelClient;
use crate::services::image_codec::ImageCodec;
use crate::services::sampling_estimator::{EstimationResult, SamplingEstimator};
use axum::Json;
use axum::extract::{Multipart, Query, State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub type EstimatorState<C> = Arc<SamplingEstimator<C>>;

#[derive(Debug, Default, Deserialize)]
pub struct EstimateParams {
    runs: Option<usize>,
}

/// `POST /v1/estimate` with multipart fields `current` and `complete`.
pub async fn post_estimate<C>(
    State(estimator): State<EstimatorState<C>>,
    Query(params): Query<EstimateParams>,
    mut multipart: Multipart,
) -> Result<Json<EstimationResult>, AppError>
where
    C: ModelClient + Send + Sync + 'static,
{
    let runs = params.runs.unwrap_or(estimator.default_runs());
    if !estimator.accepts_run_count(runs) {
        return Err(AppError::InvalidRunCount {
            max: estimator.max_runs(),
        });
    }

    let mut current = None;
    let mut complete = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("current") => current = Some(ImageCodec::decode(&field.bytes().await?)?),
            Some("complete") => complete = Some(ImageCodec::decode(&field.bytes().await?)?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    let current = current.ok_or(AppError::MissingField("current"))?;
    let complete = complete.ok_or(AppError::MissingField("complete"))?;

    info!(
        "Estimating completion of {}x{} photo against {}x{} target with {} runs",
        current.width(),
        current.height(),
        complete.width(),
        complete.height(),
        runs
    );
    let result = estimator.run(&current, &complete, runs).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::EstimationConfig;
    use crate::model::PromptPayload;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::convert::Infallible;
    use std::io::Cursor;

    const BOUNDARY: &str = "estimate-boundary";

    struct FixedReply(&'static str);

    impl ModelClient for FixedReply {
        type Error = Infallible;

        async fn generate(&self, _payload: &PromptPayload) -> Result<String, Infallible> {
            Ok(self.0.to_string())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 60, 30])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn multipart(fields: &[(&str, Vec<u8>)]) -> Multipart {
        let mut body = Vec::new();
        for (name, data) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/v1/estimate")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn state(reply: &'static str) -> State<EstimatorState<FixedReply>> {
        State(Arc::new(SamplingEstimator::new(
            FixedReply(reply),
            &EstimationConfig::default(),
        )))
    }

    #[tokio::test]
    async fn estimates_from_uploaded_images() {
        let upload = multipart(&[("current", png(4, 3)), ("complete", png(4, 3))]).await;
        let Json(result) = post_estimate(
            state("About 55% complete"),
            Query(EstimateParams { runs: Some(3) }),
            upload,
        )
        .await
        .unwrap();

        assert_eq!(result.runs.len(), 3);
        assert_eq!(result.parsed_percentages, vec![55, 55, 55]);
        assert_eq!(result.average, Some(55.0));
    }

    #[tokio::test]
    async fn uses_configured_run_count_by_default() {
        let upload = multipart(&[("complete", png(2, 2)), ("current", png(2, 2))]).await;
        let Json(result) = post_estimate(state("20%"), Query(EstimateParams::default()), upload)
            .await
            .unwrap();

        assert_eq!(result.runs.len(), 10);
    }

    #[tokio::test]
    async fn missing_field_is_rejected() {
        let upload = multipart(&[("current", png(2, 2))]).await;
        let err = post_estimate(state("20%"), Query(EstimateParams::default()), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingField("complete")));
    }

    #[tokio::test]
    async fn zero_runs_are_rejected() {
        let upload = multipart(&[("current", png(2, 2)), ("complete", png(2, 2))]).await;
        let err = post_estimate(state("20%"), Query(EstimateParams { runs: Some(0) }), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidRunCount { max: 50 }));
    }

    #[tokio::test]
    async fn run_counts_above_the_limit_are_rejected() {
        for runs in [51, 1 << 40, usize::MAX] {
            let upload = multipart(&[("current", png(2, 2)), ("complete", png(2, 2))]).await;
            let err = post_estimate(
                state("20%"),
                Query(EstimateParams { runs: Some(runs) }),
                upload,
            )
            .await
            .unwrap_err();

            assert!(matches!(err, AppError::InvalidRunCount { max: 50 }));
        }
    }

    #[tokio::test]
    async fn run_count_at_the_limit_is_accepted() {
        let upload = multipart(&[("current", png(2, 2)), ("complete", png(2, 2))]).await;
        let Json(result) = post_estimate(
            state("35%"),
            Query(EstimateParams { runs: Some(50) }),
            upload,
        )
        .await
        .unwrap();

        assert_eq!(result.runs.len(), 50);
        assert_eq!(result.average, Some(35.0));
    }

    #[tokio::test]
    async fn undecodable_upload_is_rejected() {
        let upload = multipart(&[
            ("current", b"not a picture".to_vec()),
            ("complete", png(2, 2)),
        ])
        .await;
        let err = post_estimate(state("20%"), Query(EstimateParams::default()), upload)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Image(_)));
    }
}
