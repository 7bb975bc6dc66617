//! HTTP handlers for plant images: multipart upload, primary selection and deletion.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{not_found, visible_plant},
        models::{
            plant_images::{PlantImageResponse, UploadReport, UploadedFileReport},
            users::CurrentUser,
        },
    },
    auth::permissions,
    db::{handlers::PlantImages, models::plant_images::PlantImageCreateDBRequest},
    errors::Error,
    images::{ImageConverter, ImagePipeline, IncomingFile, UploadProgress, UploadStatus},
    types::{Operation, PlantId, PlantImageId, abbrev_uuid},
};

/// List a plant's images, primary first
#[utoipa::path(
    get,
    path = "/plants/{id}/images",
    tag = "plant_images",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "The plant's images", body = Vec<PlantImageResponse>),
        (status = 404, description = "Plant not found or not visible"),
    )
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn list_images(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
    Path(id): Path<PlantId>,
) -> Result<Json<Vec<PlantImageResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_plant(&mut conn, current_user.as_ref(), id).await?;

    let images = PlantImages::new(&mut conn)
        .list_for_plant(id)
        .await?
        .into_iter()
        .map(|image| PlantImageResponse::new(image, &state.config.storage))
        .collect();

    Ok(Json(images))
}

/// Upload images
///
/// Accepts one or more `file` fields and an optional `primary` field naming the file that should
/// become the primary image. Files are processed one after another; a file that fails does not
/// stop the rest, and the response reports the outcome of each.
#[utoipa::path(
    post,
    path = "/plants/{id}/images",
    tag = "plant_images",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    request_body(content_type = "multipart/form-data", description = "`file` fields plus an optional `primary` filename"),
    responses(
        (status = 200, description = "Per-file results", body = UploadReport),
        (status = 400, description = "No files, too many files or a malformed form"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Plant not found"),
        (status = 413, description = "Request body too large"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn upload_images(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PlantId>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, Error> {
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let plant = visible_plant(&mut conn, Some(&current_user), id).await?;
        permissions::require_modify_plant(&current_user, &plant, Operation::CreateOwn)?;
    }

    let max_files = state.config.images.max_files_per_upload;
    let mut files: Vec<IncomingFile> = Vec::new();
    let mut primary: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                if files.len() == max_files {
                    return Err(Error::BadRequest {
                        message: format!("At most {max_files} files can be uploaded at once"),
                    });
                }
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("file-{}", files.len() + 1));
                let declared_type = field.content_type().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read {filename}: {e}"),
                })?;
                files.push(IncomingFile {
                    filename,
                    declared_type,
                    bytes: bytes.to_vec(),
                });
            }
            "primary" => {
                let text = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read primary field: {e}"),
                })?;
                primary = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    if files.is_empty() {
        return Err(Error::BadRequest {
            message: "No files in upload; send one or more `file` fields".to_string(),
        });
    }

    tracing::info!(files = files.len(), primary = ?primary, "Processing image upload");

    let pipeline = ImagePipeline::new(
        state.storage.clone(),
        ImageConverter::new(&state.config.images),
        state.config.images.max_file_size,
    );

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        let filename = file.filename.clone();
        let original_filename = Some(filename.clone());
        let make_primary = primary.as_deref() == Some(filename.as_str());
        let mut progress = UploadProgress::new(&filename);

        let mut image = None;
        if let Some(stored) = pipeline.upload_one(file, &mut progress).await {
            // A fresh connection per file so a slow conversion never holds one
            let created = match state.db.acquire().await {
                Ok(mut conn) => PlantImages::new(&mut conn)
                    .create(&PlantImageCreateDBRequest {
                        plant_id: id,
                        file_path: stored.storage_key.clone(),
                        content_type: stored.content_type.clone(),
                        original_filename,
                        size_bytes: stored.size_bytes,
                        make_primary,
                        created_by: Some(current_user.id),
                    })
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match created {
                Ok(row) => {
                    progress.advance(UploadStatus::Uploaded);
                    image = Some(PlantImageResponse::new(row, &state.config.storage));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to record uploaded image");
                    pipeline.discard(&stored).await;
                    progress.fail("could not record the image");
                }
            }
        }

        reports.push(UploadedFileReport {
            filename: progress.filename,
            status: progress.status,
            error: progress.error,
            image,
        });
    }

    let report = UploadReport::new(reports);
    tracing::info!(uploaded = report.uploaded, failed = report.failed, "Image upload finished");
    Ok(Json(report))
}

/// Make an image the plant's primary image
#[utoipa::path(
    post,
    path = "/plants/{id}/images/{image_id}/primary",
    tag = "plant_images",
    params(
        ("id" = uuid::Uuid, Path, description = "Plant ID"),
        ("image_id" = uuid::Uuid, Path, description = "Image ID"),
    ),
    responses(
        (status = 200, description = "The new primary image", body = PlantImageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Plant or image not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id), image_id = %abbrev_uuid(&image_id)))]
pub async fn set_primary_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, image_id)): Path<(PlantId, PlantImageId)>,
) -> Result<Json<PlantImageResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = visible_plant(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_plant(&current_user, &plant, Operation::UpdateOwn)?;

    let image = PlantImages::new(&mut conn).set_primary(id, image_id).await?;
    Ok(Json(PlantImageResponse::new(image, &state.config.storage)))
}

/// Delete an image and its stored file
///
/// Deleting the primary image promotes the oldest remaining one.
#[utoipa::path(
    delete,
    path = "/plants/{id}/images/{image_id}",
    tag = "plant_images",
    params(
        ("id" = uuid::Uuid, Path, description = "Plant ID"),
        ("image_id" = uuid::Uuid, Path, description = "Image ID"),
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Plant or image not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id), image_id = %abbrev_uuid(&image_id)))]
pub async fn delete_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, image_id)): Path<(PlantId, PlantImageId)>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = visible_plant(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_plant(&current_user, &plant, Operation::DeleteOwn)?;

    let deleted = PlantImages::new(&mut conn)
        .delete(id, image_id)
        .await?
        .ok_or_else(|| not_found("Image", image_id))?;

    if let Err(e) = state.storage.delete(&deleted.file_path).await {
        tracing::warn!(storage_key = %deleted.file_path, error = %e, "Failed to delete image file");
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::plant_images::{PlantImageResponse, UploadReport};
    use crate::api::models::plants::PlantResponse;
    use crate::images::UploadStatus;
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_app_with_config, create_test_config, create_test_plant, create_test_user};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use image::{DynamicImage, ImageBuffer, Rgb};
    use sqlx::PgPool;
    use std::io::Cursor;

    fn png(shade: u8) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(8, 8, Rgb([shade, 120, 60]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn image_part(name: &str, bytes: Vec<u8>) -> Part {
        Part::bytes(bytes).file_name(name.to_string()).mime_type("image/png")
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_reports_each_file(pool: PgPool) {
        let (app, storage_dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let auth = add_auth_headers(&user);
        let plant = create_test_plant(&pool, user.id, "Bellis perennis", "Daisy", false).await;

        let form = MultipartForm::new()
            .add_part("file", image_part("first.png", png(10)))
            .add_part("file", Part::bytes(b"not an image".to_vec()).file_name("notes.txt").mime_type("text/plain"))
            .add_part("file", image_part("second.png", png(200)))
            .add_text("primary", "second.png");

        let response = app
            .post(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&auth[0].0, &auth[0].1)
            .multipart(form)
            .await;
        response.assert_status_ok();

        let report: UploadReport = response.json();
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.failed, 1);
        let statuses: Vec<_> = report.files.iter().map(|f| f.status).collect();
        assert_eq!(statuses, vec![UploadStatus::Uploaded, UploadStatus::Failed, UploadStatus::Uploaded]);
        assert_eq!(report.files[1].filename, "notes.txt");
        assert!(report.files[1].error.as_deref().unwrap().contains("unsupported"));

        let second = report.files[2].image.clone().unwrap();
        assert!(second.is_primary);
        assert_eq!(second.content_type, "image/webp");

        let detail: PlantResponse = app
            .get(&format!("/api/v1/plants/{plant}"))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(detail.images.len(), 2);
        assert_eq!(detail.images[0].id, second.id);
        assert_eq!(detail.primary_image_url.as_deref(), Some(second.url.as_str()));

        // The converted file landed in the storage directory
        let key = second.url.rsplit("/storage/").next().unwrap();
        assert!(storage_dir.path().join(key).exists());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_limits_and_permissions(pool: PgPool) {
        let mut config = create_test_config();
        config.images.max_files_per_upload = 1;
        let (app, _storage) = create_test_app_with_config(pool.clone(), config).await;
        let owner = create_test_user(&pool).await;
        let stranger = create_test_user(&pool).await;
        let plant = create_test_plant(&pool, owner.id, "Primula vulgaris", "Primrose", true).await;
        let owner_auth = add_auth_headers(&owner);
        let stranger_auth = add_auth_headers(&stranger);

        app.post(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&stranger_auth[0].0, &stranger_auth[0].1)
            .multipart(MultipartForm::new().add_part("file", image_part("a.png", png(1))))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.post(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&owner_auth[0].0, &owner_auth[0].1)
            .multipart(
                MultipartForm::new()
                    .add_part("file", image_part("a.png", png(1)))
                    .add_part("file", image_part("b.png", png(2))),
            )
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&owner_auth[0].0, &owner_auth[0].1)
            .multipart(MultipartForm::new().add_text("primary", "a.png"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_switch_and_delete_primary(pool: PgPool) {
        let (app, storage_dir) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let auth = add_auth_headers(&user);
        let plant = create_test_plant(&pool, user.id, "Viola odorata", "Sweet violet", false).await;

        let report: UploadReport = app
            .post(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&auth[0].0, &auth[0].1)
            .multipart(
                MultipartForm::new()
                    .add_part("file", image_part("a.png", png(1)))
                    .add_part("file", image_part("b.png", png(2))),
            )
            .await
            .json();
        let first = report.files[0].image.clone().unwrap();
        let second = report.files[1].image.clone().unwrap();
        assert!(first.is_primary, "first image of a plant becomes primary");
        assert!(!second.is_primary);

        let switched: PlantImageResponse = app
            .post(&format!("/api/v1/plants/{plant}/images/{}/primary", second.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert!(switched.is_primary);

        app.delete(&format!("/api/v1/plants/{plant}/images/{}", second.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let images: Vec<PlantImageResponse> = app
            .get(&format!("/api/v1/plants/{plant}/images"))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, first.id);
        assert!(images[0].is_primary, "remaining image is promoted");

        let deleted_key = second.url.rsplit("/storage/").next().unwrap();
        assert!(!storage_dir.path().join(deleted_key).exists());

        app.delete(&format!("/api/v1/plants/{plant}/images/{}", second.id))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
