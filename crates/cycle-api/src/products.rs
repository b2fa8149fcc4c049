use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use cycle_db::models::{NewProduct, ProductChanges, ProductImageRow};
use cycle_types::api::{PageQuery, ProductDetailResponse, ProductsResponse, StatusMessage};
use cycle_types::models::{Category, PublicProfile};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::form::{FormFile, UploadForm};
use crate::images::Transform;
use crate::middleware::AuthUser;
use crate::state::{AppState, AppStateInner};
use crate::validation;
use crate::views;

const LATEST_LIMIT: u32 = 10;

fn not_found() -> ApiError {
    ApiError::NotFound("Product not found!".into())
}

/// Upload every file, releasing the ones already stored if a later one fails.
async fn upload_all(state: &AppStateInner, files: Vec<FormFile>) -> ApiResult<Vec<ProductImageRow>> {
    let mut images = Vec::with_capacity(files.len());
    for file in files {
        match state.images.upload(file.into_upload(), Transform::ProductPhoto).await {
            Ok(uploaded) => images.push(ProductImageRow {
                image_id: uploaded.id,
                url: uploaded.url,
            }),
            Err(e) => {
                release(state, images).await;
                return Err(e.into());
            }
        }
    }
    Ok(images)
}

async fn release(state: &AppStateInner, images: Vec<ProductImageRow>) {
    let ids: Vec<String> = images.into_iter().map(|img| img.image_id).collect();
    if let Err(e) = state.images.delete_resources(&ids).await {
        warn!(count = ids.len(), "Failed to release uploaded images: {}", e);
    }
}

pub async fn list_new_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let input = validation::product(&form)?;
    let files = form.take_files("images");
    validation::product_images(&files, 0)?;

    let images = upload_all(&state, files).await?;

    let product_id = Uuid::new_v4();
    state.db.insert_product(&NewProduct {
        id: &product_id.to_string(),
        owner_id: &user.id.to_string(),
        name: &input.name,
        description: &input.description,
        price: input.price,
        category: input.category.as_str(),
        purchasing_date: &input.purchasing_date.to_rfc3339(),
        images: &images,
    })?;

    info!(product_id = %product_id, owner = %user.id, images = images.len(), "Product listed");

    Ok((StatusCode::CREATED, Json(StatusMessage::new("Added new product!"))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let product_id = validation::id(&id, "Invalid product id!")?.to_string();
    let owner_id = user.id.to_string();
    let input = validation::product(&form)?;

    let product = state
        .db
        .get_product(&product_id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or_else(not_found)?;

    let files = form.take_files("images");
    validation::product_images(&files, product.images.len())?;

    let thumbnail = form.field("thumbnail").map(str::trim).filter(|t| !t.is_empty());
    if thumbnail.is_some_and(|t| !product.images.iter().any(|img| img.url == t)) {
        return Err(ApiError::Validation("Invalid thumbnail!".into()));
    }

    let images = upload_all(&state, files).await?;

    let updated = state.db.update_product(
        &product_id,
        &owner_id,
        &ProductChanges {
            name: &input.name,
            description: &input.description,
            price: input.price,
            category: input.category.as_str(),
            purchasing_date: &input.purchasing_date.to_rfc3339(),
            new_images: &images,
            thumbnail,
        },
    )?;
    if !updated {
        release(&state, images).await;
        return Err(not_found());
    }

    Ok(Json(StatusMessage::new("Product updated successfully.")))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product_id = validation::id(&id, "Invalid product id!")?;

    let product = state
        .db
        .delete_product(&product_id.to_string(), &user.id.to_string())?
        .ok_or_else(not_found)?;

    let ids: Vec<String> = product.images.into_iter().map(|img| img.image_id).collect();
    state.images.delete_resources(&ids).await?;

    info!(product_id = %product_id, "Product removed");

    Ok(Json(StatusMessage::new("Product removed successfully.")))
}

pub async fn delete_product_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, image_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let product_id = validation::id(&id, "Invalid product id!")?.to_string();
    let owner_id = user.id.to_string();

    let product = state
        .db
        .get_product(&product_id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or_else(not_found)?;
    if !product.images.iter().any(|img| img.image_id == image_id) {
        return Err(ApiError::NotFound("Image not found!".into()));
    }

    state
        .db
        .remove_product_image(&product_id, &owner_id, &image_id)?
        .ok_or_else(not_found)?;
    state.images.destroy(&image_id).await?;

    Ok(Json(StatusMessage::new("Image removed successfully.")))
}

pub async fn get_product_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product_id = validation::id(&id, "Invalid product id!")?;

    let product = state.db.get_product(&product_id.to_string())?.ok_or_else(not_found)?;
    let seller = state.db.get_user_by_id(&product.owner_id)?.ok_or_else(not_found)?;

    Ok(Json(ProductDetailResponse {
        product: views::product_detail(&product, views::public_profile(&seller)),
    }))
}

pub async fn get_products_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let category: Category = category
        .parse()
        .map_err(|_| ApiError::Validation("Invalid category!".into()))?;
    let (offset, limit) = validation::page(&query);

    let rows = state.db.list_products_by_category(category.as_str(), offset, limit)?;

    Ok(Json(ProductsResponse {
        products: rows.iter().map(views::product_summary).collect(),
    }))
}

pub async fn get_latest_products(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.db.latest_products(LATEST_LIMIT)?;

    Ok(Json(ProductsResponse {
        products: rows.iter().map(views::product_summary).collect(),
    }))
}

/// The caller's own products, with full details.
pub async fn get_listings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let (offset, limit) = validation::page(&query);
    let rows = state.db.list_products_by_owner(&user.id.to_string(), offset, limit)?;
    let seller = PublicProfile::from(&user);

    Ok(Json(ProductsResponse {
        products: rows
            .iter()
            .map(|row| views::product_detail(row, seller.clone()))
            .collect(),
    }))
}
