// src/handlers.rs
use crate::services::image_processor::content_type_for;
use crate::services::submission::{self, lock};
use crate::{AppState, errors::ConsignError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use bytes::Bytes;
use chrono::Utc;
use futures_util::TryStreamExt;
use log::info;
use serde::Deserialize;
use uuid::Uuid;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/sessions", web::post().to(create_session))
            .route("/sessions/{session_id}", web::get().to(get_session))
            .route("/sessions/{session_id}", web::delete().to(abandon_session))
            .route("/sessions/{session_id}/images", web::post().to(upload_images))
            .route(
                "/sessions/{session_id}/images/{index}",
                web::delete().to(delete_image),
            )
            .route("/sessions/{session_id}/product", web::put().to(update_product))
            .route("/sessions/{session_id}/submit", web::post().to(submit))
            .route("/sessions/{session_id}/back", web::post().to(go_back))
            .route("/dashboard/items", web::get().to(list_items))
            .route("/dashboard/summary", web::get().to(item_summary))
            .route("/dashboard/items/{item_id}/status", web::put().to(update_item_status))
            .route("/dashboard/items/{item_id}/approve", web::post().to(approve_item))
            .route("/dashboard/items/{item_id}/reject", web::post().to(reject_item)),
    )
    .route("/health", web::get().to(health_check));
}

async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "consign-guard",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": format!("{:?}", data.analyzer.protocol()),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub seller: Option<String>,
}

pub async fn create_session(
    data: web::Data<AppState>,
    body: Option<web::Json<CreateSessionRequest>>,
) -> Result<HttpResponse, Error> {
    let seller = body
        .and_then(|b| b.into_inner().seller)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "위탁판매자".to_string());

    let session = data.sessions.create(seller);
    let view = lock(&session).view();
    info!("Opened form session {}", view.id);

    Ok(HttpResponse::Created().json(&view))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner())?;
    let view = lock(&session).view();
    Ok(HttpResponse::Ok().json(&view))
}

pub async fn abandon_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    data.sessions.remove(&session_id)?;
    info!("Abandoned form session {}", session_id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn upload_images(
    path: web::Path<Uuid>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let session = data.sessions.get(&session_id)?;
    let remaining = {
        let form = lock(&session);
        form.ensure_editable()?;
        form.collector().remaining()
    };
    let mut picked = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        // refuse the batch before buffering a field that cannot fit
        if picked.len() == remaining {
            return Err(ConsignError::CapacityExceeded {
                requested: picked.len() + 1,
                remaining,
            }
            .into());
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string());

        // Collect image data
        let mut image_data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            image_data.extend_from_slice(&chunk);
        }

        data.image_processor.validate_image(&image_data)?;
        let processed = data.image_processor.resize_if_needed(&image_data)?;

        let content_type = content_type_for(filename.as_deref()).to_string();
        picked.push(ImageRef::new(filename, content_type, Bytes::from(processed)));
    }

    if picked.is_empty() {
        return Err(ConsignError::Validation("No images in upload".to_string()).into());
    }

    let uploaded: Vec<Uuid> = picked.iter().map(|image| image.id).collect();
    let remaining = {
        let mut form = lock(&session);
        form.add_images(picked)?;
        form.collector().remaining()
    };

    info!(
        "Session {} received {} images, {} slots left",
        session_id,
        uploaded.len(),
        remaining
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "uploaded_images": uploaded,
        "count": uploaded.len(),
        "remaining": remaining
    })))
}

pub async fn delete_image(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, index) = path.into_inner();
    let session = data.sessions.get(&session_id)?;

    let view = {
        let mut form = lock(&session);
        form.remove_image(index)?;
        form.view()
    };

    Ok(HttpResponse::Ok().json(&view))
}

#[derive(Debug, Deserialize)]
pub struct ProductUpdate {
    pub item_name: Option<String>,
    pub model_name: Option<String>,
    pub condition: Option<String>,
}

pub async fn update_product(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<ProductUpdate>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner())?;
    let update = body.into_inner();

    let condition = update
        .condition
        .as_deref()
        .map(Condition::parse_selection)
        .transpose()?;

    let view = {
        let mut form = lock(&session);
        form.update_product(|product| {
            if let Some(name) = &update.item_name {
                product.set_item_name(name);
            }
            if let Some(name) = &update.model_name {
                product.set_model_name(name);
            }
            if let Some(condition) = condition {
                product.set_condition(condition);
            }
        })?;
        form.view()
    };

    Ok(HttpResponse::Ok().json(&view))
}

pub async fn submit(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner())?;

    let outcome =
        submission::submit(session, data.analyzer.as_ref(), data.notification).await?;

    let listed = data
        .items
        .record_submission(&outcome.seller, &outcome.product, outcome.result.is_fake);
    info!("Listed item {} as {:?}", listed.id, listed.status);

    Ok(HttpResponse::Ok().json(&outcome.presentation))
}

pub async fn go_back(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.sessions.get(&path.into_inner())?;
    let view = {
        let mut form = lock(&session);
        form.go_back();
        form.view()
    };
    Ok(HttpResponse::Ok().json(&view))
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub range: Option<String>,
    pub status: Option<String>,
}

fn parse_range(range: Option<&str>) -> Result<TimeRange, ConsignError> {
    range.map(str::parse).transpose().map(Option::unwrap_or_default)
}

pub async fn list_items(
    data: web::Data<AppState>,
    query: web::Query<ItemQuery>,
) -> Result<HttpResponse, Error> {
    let range = query
        .range
        .as_deref()
        .map(str::parse::<TimeRange>)
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ItemStatus>)
        .transpose()?;

    let items: Vec<ListedItem> = match range {
        Some(range) => data.items.filter(range, status, Utc::now().date_naive()),
        None => data
            .items
            .list()
            .into_iter()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .collect(),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "range": range.map(|r| r.label()),
        "items": items,
        "count": items.len()
    })))
}

pub async fn item_summary(
    data: web::Data<AppState>,
    query: web::Query<ItemQuery>,
) -> Result<HttpResponse, Error> {
    let range = parse_range(query.range.as_deref())?;
    let summary = data.items.summary(range, Utc::now().date_naive());
    Ok(HttpResponse::Ok().json(&summary))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ItemStatus,
}

pub async fn update_item_status(
    path: web::Path<String>,
    data: web::Data<AppState>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, Error> {
    let item = data.items.update_status(&path.into_inner(), body.status)?;
    Ok(HttpResponse::Ok().json(&item))
}

pub async fn approve_item(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let item = data.items.approve(&path.into_inner())?;
    info!("Approved item {}", item.id);
    Ok(HttpResponse::Ok().json(&item))
}

pub async fn reject_item(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let item = data.items.reject(&path.into_inner())?;
    info!("Rejected item {}", item.id);
    Ok(HttpResponse::Ok().json(&item))
}
