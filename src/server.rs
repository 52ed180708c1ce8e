use actix_web::{
    http::{header, StatusCode},
    middleware, web, App, HttpResponse, HttpServer, ResponseError,
};
use futures::StreamExt;
use serde_json::json;

use crate::{
    error::{PipelineError, Stage},
    models::{ErrorResponse, GenerationRequest},
    pipeline::Pipeline,
};

/// Upper bound for a request body; pasted articles can be long.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.message().to_string(),
            stage: self.stage().to_string(),
        })
    }
}

/// Registers the generation endpoint and the health probe.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/generate")
            .route(web::post().to(generate))
            .default_service(web::to(method_not_allowed)),
    )
    .route("/health", web::get().to(health));
}

async fn generate(
    pipeline: web::Data<Pipeline>,
    payload: web::Payload,
) -> Result<HttpResponse, PipelineError> {
    let body = read_body(payload, MAX_BODY_BYTES).await?;
    let request: GenerationRequest = serde_json::from_slice(&body).map_err(|e| {
        log::warn!("Rejected malformed request body: {}", e);
        PipelineError::BadRequest(format!("Malformed JSON body: {}", e))
    })?;

    let response = pipeline.run(request).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Collects the body, rejecting it as a bad request once it exceeds `limit`.
async fn read_body(
    mut payload: web::Payload,
    limit: usize,
) -> Result<web::BytesMut, PipelineError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            PipelineError::BadRequest(format!("Failed to read request body: {}", e))
        })?;
        if body.len() + chunk.len() > limit {
            log::warn!("Rejected request body larger than {} bytes", limit);
            return Err(PipelineError::BadRequest(format!(
                "Request body exceeds {} bytes",
                limit
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST"))
        .json(ErrorResponse {
            error: "Method not allowed, use POST".to_string(),
            stage: Stage::BadRequest.to_string(),
        })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn run(pipeline: Pipeline, host: &str, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(pipeline);
    log::info!("🌐 Listening on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(routes)
    })
    .bind((host, port))?
    .run()
    .await
}
