use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use log::{error, info, warn};
use serde::Serialize;
use shared::{PredictRequest, Prediction, TrainingJob};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use crate::pipeline::{PredictionError, PredictionPipeline};
use crate::training::{TrainingError, TrainingService};
use crate::utils::codec::{decode_image, CodecError};

const JSON_LIMIT: usize = 16 * 1024 * 1024;

/// Everything the handlers need, built once in `main`.
pub struct AppState {
    pub pipeline: PredictionPipeline,
    pub training: TrainingService,
    pub upload_dir: PathBuf,
    pub template_dir: PathBuf,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    job: Option<TrainingJob>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Codec(CodecError::InvalidBase64(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Training(TrainingError::AlreadyRunning(_)) => StatusCode::CONFLICT,
            ApiError::Training(TrainingError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let job = match self {
            ApiError::Training(TrainingError::AlreadyRunning(job)) => Some(job.as_ref().clone()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            job,
        })
    }
}

/// Development CORS policy: any origin, method and header, no credentials.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(web::resource("/").route(web::get().to(home)))
    .service(web::resource("/train").route(web::post().to(train)))
    .service(web::resource("/train/{job_id}").route(web::get().to(training_status)))
    .service(web::resource("/predict").route(web::post().to(predict)))
    .service(Files::new("/static", static_dir));
}

async fn home(state: web::Data<AppState>) -> Result<NamedFile, ApiError> {
    let index = state.template_dir.join("index.html");
    NamedFile::open_async(&index).await.map_err(|e| {
        error!("Failed to open template {}: {}", index.display(), e);
        ApiError::Internal(format!("landing page unavailable: {}", e))
    })
}

async fn train(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let job = state.training.start().await?;
    Ok(HttpResponse::Accepted().json(job))
}

async fn training_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let job_id = Uuid::parse_str(&path.into_inner())
        .map_err(|_| ApiError::BadRequest("Invalid UUID format".into()))?;
    let job = state.training.get(job_id).await?;
    Ok(HttpResponse::Ok().json(job))
}

async fn predict(
    state: web::Data<AppState>,
    body: web::Json<PredictRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    if request.image.trim().is_empty() {
        return Err(ApiError::BadRequest("image must not be empty".into()));
    }

    let filename = state.upload_dir.join(format!("{}.jpg", Uuid::new_v4()));
    let predictions = web::block(move || -> Result<Vec<Prediction>, ApiError> {
        decode_image(&request.image, &filename)?;
        let result = state.pipeline.predict(&filename);
        if let Err(e) = fs::remove_file(&filename) {
            warn!("Could not remove {}: {}", filename.display(), e);
        }
        Ok(result?)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .inspect_err(|e| error!("Prediction failed: {}", e))?;

    info!("Prediction: {:?}", predictions);
    Ok(HttpResponse::Ok().json(predictions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prediction::tests::FixedLoader;
    use crate::training::tests::wait_until_finished;
    use actix_web::{http::header, test, App};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::{Rgb, RgbImage};
    use serde_json::{json, Value};
    use shared::{JobStatus, Label};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        state: web::Data<AppState>,
    }

    fn fixture(scores: Vec<f32>, train_command: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates");
        let uploads = dir.path().join("uploads");
        fs::create_dir_all(&templates).unwrap();
        fs::create_dir_all(&uploads).unwrap();
        fs::write(templates.join("index.html"), "<html><body>scan</body></html>").unwrap();
        let model = dir.path().join("model.pt");
        fs::write(&model, b"weights").unwrap();

        let state = web::Data::new(AppState {
            pipeline: PredictionPipeline::new(model, (8, 8), Box::new(FixedLoader::new(scores))),
            training: TrainingService::new(train_command).unwrap(),
            upload_dir: uploads,
            template_dir: templates,
        });
        Fixture { dir, state }
    }

    fn png_base64() -> String {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        STANDARD.encode(bytes)
    }

    macro_rules! app {
        ($fixture:expr) => {
            test::init_service(
                App::new()
                    .app_data($fixture.state.clone())
                    .configure(|cfg| configure_routes(cfg, $fixture.dir.path().join("static"))),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn home_serves_html() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[actix_web::test]
    async fn predict_returns_single_label() {
        let fx = fixture(vec![0.1, 0.9], "true");
        let app = app!(fx);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"image": png_base64()}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!([{"image": "Normal"}]));
        let labels: Vec<String> = Label::ALL.iter().map(|l| l.to_string()).collect();
        assert!(labels.contains(&body[0]["image"].as_str().unwrap().to_string()));

        let leftovers = fs::read_dir(fx.dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[actix_web::test]
    async fn predict_accepts_line_wrapped_payload() {
        let fx = fixture(vec![0.8, 0.2], "true");
        let app = app!(fx);
        let encoded = png_base64();
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"image": format!("{}\n{}\n", head, tail)}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!([{"image": "Adenocarcinoma Cancer"}]));
    }

    #[actix_web::test]
    async fn predict_without_image_is_bad_request() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"picture": "abc"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("image"));
    }

    #[actix_web::test]
    async fn predict_with_non_base64_is_bad_request() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"image": "%%% not base64 %%%"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn predict_with_non_image_is_server_error() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"image": STANDARD.encode(b"just some text")}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("decode"));
    }

    #[actix_web::test]
    async fn predict_without_model_is_server_error() {
        let fx = fixture(vec![1.0], "true");
        fs::remove_file(fx.dir.path().join("model.pt")).unwrap();
        let app = app!(fx);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({"image": png_base64()}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn train_runs_in_background() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let resp = test::call_service(&app, test::TestRequest::post().uri("/train").to_request()).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let job: TrainingJob = test::read_body_json(resp).await;
        assert_eq!(job.status, JobStatus::Pending);

        wait_until_finished(&fx.state.training, job.id).await;

        let req = test::TestRequest::get()
            .uri(&format!("/train/{}", job.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let job: TrainingJob = test::read_body_json(resp).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[actix_web::test]
    async fn train_launches_command_once_per_call() {
        let scripts = TempDir::new().unwrap();
        let script = scripts.path().join("train.sh");
        let runs = scripts.path().join("runs.log");
        fs::write(&script, format!("echo run >> {}\n", runs.display())).unwrap();

        let fx = fixture(vec![1.0], &format!("sh {}", script.display()));
        let app = app!(fx);
        for expected in 1..=2 {
            let resp = test::call_service(&app, test::TestRequest::post().uri("/train").to_request()).await;
            assert_eq!(resp.status(), StatusCode::ACCEPTED);
            let job: TrainingJob = test::read_body_json(resp).await;
            let finished = wait_until_finished(&fx.state.training, job.id).await;
            assert_eq!(finished.status, JobStatus::Completed);
            assert_eq!(fs::read_to_string(&runs).unwrap().lines().count(), expected);
        }
    }

    #[actix_web::test]
    async fn failed_training_is_reported() {
        let fx = fixture(vec![1.0], "false");
        let app = app!(fx);
        let resp = test::call_service(&app, test::TestRequest::post().uri("/train").to_request()).await;
        let job: TrainingJob = test::read_body_json(resp).await;
        let finished = wait_until_finished(&fx.state.training, job.id).await;
        assert_eq!(finished.status, JobStatus::Failed);
    }

    #[actix_web::test]
    async fn concurrent_training_conflicts() {
        let fx = fixture(vec![1.0], "sleep 1");
        let app = app!(fx);
        let first = test::call_service(&app, test::TestRequest::post().uri("/train").to_request()).await;
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let second = test::call_service(&app, test::TestRequest::post().uri("/train").to_request()).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(second).await;
        assert!(body["job"]["id"].is_string());
    }

    #[actix_web::test]
    async fn preflight_allows_any_origin_method_and_header() {
        let fx = fixture(vec![1.0], "true");
        let app = test::init_service(
            App::new()
                .wrap(cors())
                .app_data(fx.state.clone())
                .configure(|cfg| configure_routes(cfg, fx.dir.path().join("static"))),
        )
        .await;

        let origin = "http://scans.example.org:3000";
        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/predict")
            .insert_header((header::ORIGIN, origin))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "x-scan-id"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let headers = resp.headers();
        let allow_origin = headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap();
        assert_eq!(allow_origin.to_str().unwrap(), origin);
        let allow_methods = headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(allow_methods.contains("PATCH"));
        let allow_headers = headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allow_headers.contains("x-scan-id"));
    }

    #[actix_web::test]
    async fn training_status_errors() {
        let fx = fixture(vec![1.0], "true");
        let app = app!(fx);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/train/not-a-uuid").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/train/{}", Uuid::new_v4()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
