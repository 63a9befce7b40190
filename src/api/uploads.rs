use actix_multipart::Multipart;
use actix_web::{HttpResponse, get, post, web};
use futures_util::StreamExt;
use log::{error, info};

use crate::error::{ApiError, ValidationError};
use crate::server::AppState;

const UPLOAD_FIELD: &str = "file";

#[get("/uploads")]
pub async fn list_uploads(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let files = data
        .storage
        .list()
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to list uploads"))?;
    Ok(HttpResponse::Ok().json(files))
}

#[post("/uploads")]
pub async fn upload(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::validation(e.to_string()))?;
        let disposition = field.content_disposition();
        let is_file = disposition.get_name() == Some(UPLOAD_FIELD);
        let orig_name = disposition.get_filename().unwrap_or("file").to_string();
        if !is_file {
            // drain unrelated form fields
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| ApiError::validation(e.to_string()))?;
            }
            continue;
        }

        info!("uploading file: {}", orig_name);
        let mut pending = data
            .storage
            .begin(&orig_name)
            .await
            .map_err(|e| ApiError::from_store(e, "Failed to upload file"))?;
        while let Some(chunk) = field.next().await {
            let written = match chunk {
                Ok(bytes) => pending.write(&bytes).await,
                Err(e) => Err(ValidationError::new(e.to_string()).into()),
            };
            if let Err(e) = written {
                pending.abort().await;
                return Err(ApiError::from_store(e, "Failed to upload file"));
            }
        }
        let size = pending.written();
        let stored = pending
            .commit()
            .await
            .map_err(|e| ApiError::from_store(e, "Failed to upload file"))?;
        info!("[API] stored upload {} ({} bytes)", stored.name, size);
        return Ok(HttpResponse::Created().json(stored));
    }
    error!("upload called but no file part found in the request");
    Err(ApiError::validation("file is required"))
}
