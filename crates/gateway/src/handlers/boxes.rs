use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use boxkeeper_inventory::{BoxFields, BoxWithItems, ItemFields, ItemRecord};
use bytes::Bytes;
use std::sync::Arc;

use super::session_token;
use crate::error::ApiError;
use crate::models::{CreateBoxResponse, MessageResponse};
use crate::AppState;

pub async fn create_box(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BoxFields>,
) -> Result<Json<CreateBoxResponse>, ApiError> {
    let token = session_token(&headers)?;
    let record = state.keeper.create_box(token, &payload).await?;
    Ok(Json(CreateBoxResponse {
        box_id: record.box_id,
        qr_code_url: record.label_url,
    }))
}

pub async fn get_boxes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BoxWithItems>>, ApiError> {
    let token = session_token(&headers)?;
    Ok(Json(state.keeper.list_boxes(token).await?))
}

pub async fn get_box(
    State(state): State<Arc<AppState>>,
    Path(box_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<BoxWithItems>, ApiError> {
    let token = session_token(&headers)?;
    Ok(Json(state.keeper.get_box(token, &box_id).await?))
}

pub async fn delete_box(
    State(state): State<Arc<AppState>>,
    Path(box_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = session_token(&headers)?;
    state.keeper.delete_box(token, &box_id).await?;
    Ok(Json(MessageResponse::new("Box deleted successfully")))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((box_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<ItemFields>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = session_token(&headers)?;
    state.keeper.update_item(token, &box_id, &item_id, &payload).await?;
    Ok(Json(MessageResponse::new("Item updated successfully")))
}

#[derive(Default)]
struct AddItemForm {
    box_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    quality: Option<String>,
    quantity: Option<String>,
    image: Option<Bytes>,
}

impl AddItemForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = AddItemForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let read_err = |e: axum::extract::multipart::MultipartError| {
                ApiError::bad_request(format!("unreadable field {name}: {e}"))
            };
            match name.as_str() {
                "image" => form.image = Some(field.bytes().await.map_err(read_err)?),
                "box_id" => form.box_id = Some(field.text().await.map_err(read_err)?),
                "name" => form.name = Some(field.text().await.map_err(read_err)?),
                "description" => form.description = Some(field.text().await.map_err(read_err)?),
                "quality" => form.quality = Some(field.text().await.map_err(read_err)?),
                "quantity" => form.quantity = Some(field.text().await.map_err(read_err)?),
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_parts(self) -> Result<(String, ItemFields, Bytes), ApiError> {
        let box_id = self
            .box_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("box_id is required"))?;
        let quality = self
            .quality
            .and_then(|q| q.trim().parse().ok())
            .ok_or_else(|| ApiError::bad_request("quality must be between 1 and 10"))?;
        let quantity = self
            .quantity
            .and_then(|q| q.trim().parse().ok())
            .ok_or_else(|| ApiError::bad_request("quantity must be a positive integer"))?;
        let image = self
            .image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ApiError::bad_request("image is required"))?;

        let fields = ItemFields {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            quality,
            quantity,
        };
        Ok((box_id.trim().to_string(), fields, image))
    }
}

pub async fn add_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ItemRecord>, ApiError> {
    let token = session_token(&headers)?;
    // reject bad sessions before buffering the upload
    state.keeper.sessions().verify(token)?;
    let (box_id, fields, image) = AddItemForm::read(multipart).await?.into_parts()?;
    let record = state.keeper.add_item(token, &box_id, &fields, image).await?;
    Ok(Json(record))
}
