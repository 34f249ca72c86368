use crate::models::{
    Album, Attachment, Category, Container, MediaItem, Visitor, MEDIA_ATTACHMENT_TYPE,
};
use crate::services::attachment::{UploadContext, UploadedFile};
use crate::services::entity::{EntityKey, MediaOrder, MediaQuery, MediaScope};
use crate::services::media::{MediaCreator, MediaEditor};
use crate::services::page_nav::{PageLinks, PageNav};
use crate::services::transform::{LazyMedia, MediaTransformer};
use crate::web::error::{ensure, ApiError, AppResult};
use crate::web::extractors::CurrentVisitor;
use crate::web::state::AppState;
use axum::body::Body;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

const MEDIA_NOT_FOUND: &str = "The requested media item could not be found.";
const ALBUM_NOT_FOUND: &str = "The requested album could not be found.";
const CATEGORY_NOT_FOUND: &str = "The requested category could not be found.";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub media_id: Option<u32>,
    #[serde(default)]
    pub order: MediaOrder,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditParams {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl EditParams {
    /// Body fields win over query string fields.
    fn merge(self, fallback: EditParams) -> Self {
        Self {
            title: self.title.or(fallback.title),
            description: self.description.or(fallback.description),
        }
    }
}

#[derive(Debug, Default)]
struct CreateForm {
    album_id: u32,
    category_id: u32,
    title: String,
    description: String,
    file: Option<UploadedFile>,
}

impl CreateForm {
    async fn read(multipart: &mut Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "album_id" => form.album_id = parse_uint(&field.text().await?),
                "category_id" => form.category_id = parse_uint(&field.text().await?),
                "title" => form.title = field.text().await?,
                "description" => form.description = field.text().await?,
                "file" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    form.file = Some(UploadedFile {
                        filename,
                        content_type,
                        data: data.to_vec(),
                    });
                }
                other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }
}

/// Unsigned integer input: anything unparsable counts as 0.
fn parse_uint(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

fn media_id_from(path: Result<Path<u32>, PathRejection>) -> AppResult<u32> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::not_found(MEDIA_NOT_FOUND))
}

#[derive(Serialize)]
struct MediaList<'a> {
    items: LazyMedia<'a>,
    items_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<PageLinks>,
}

/// GET /media
pub async fn get_index(
    State(state): State<Arc<AppState>>,
    CurrentVisitor(visitor): CurrentVisitor,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    if let Some(media_id) = params.media_id.filter(|id| *id > 0) {
        return single(&state, &visitor, media_id);
    }

    let scope = MediaScope::for_visitor(&visitor);
    let total = state.store.count_media(&scope)?;
    let nav = PageNav::new(params.page, params.limit, &state.config.api).within(total);

    let items = if total > 0 {
        state.store.fetch_media(&MediaQuery {
            scope,
            order: params.order,
            limit: nav.limit,
            offset: nav.offset(),
        })?
    } else {
        Vec::new()
    };

    let base_url = state.base_url();
    let links = nav.links(total, |page| {
        format!(
            "{}/media?order={}&page={}&limit={}",
            base_url,
            params.order.as_str(),
            page,
            nav.limit
        )
    });

    let transformer = MediaTransformer::new(
        state.store.as_ref(),
        state.permissions.as_ref(),
        &visitor,
        base_url,
    );
    let body = MediaList {
        items: transformer.lazily(items),
        items_total: total,
        links,
    };
    let body = serde_json::to_value(&body).map_err(anyhow::Error::from)?;

    Ok(Json(body).into_response())
}

/// GET /media/:media_id
pub async fn get_single(
    State(state): State<Arc<AppState>>,
    CurrentVisitor(visitor): CurrentVisitor,
    path: Result<Path<u32>, PathRejection>,
) -> AppResult<Response> {
    let media_id = media_id_from(path)?;
    single(&state, &visitor, media_id)
}

/// POST /media
pub async fn post_index(
    State(state): State<Arc<AppState>>,
    CurrentVisitor(visitor): CurrentVisitor,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let form = CreateForm::read(&mut multipart).await?;

    let container = if form.album_id > 0 {
        Container::Album(assert_viewable_album(&state, &visitor, form.album_id)?)
    } else if form.category_id > 0 {
        Container::Category(assert_viewable_category(&state, &visitor, form.category_id)?)
    } else {
        return Err(ApiError::NoContainerSpecified);
    };

    ensure(state.permissions.can_add_media(&visitor, &container))?;

    let context = UploadContext::for_container(container.reference());
    let temp_hash = state.attachments.temp_hash(&context);
    let file = form
        .file
        .ok_or_else(|| ApiError::field("file", "Please upload a file."))?;
    let attachment =
        state
            .attachments
            .upload(&visitor, &temp_hash, MEDIA_ATTACHMENT_TYPE, &context, file)?;

    let media_temp = state
        .store
        .find_media_temp(attachment.attachment_id)?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Upload {} produced no staged media record",
                attachment.attachment_id
            )
        })?;

    let mut creator = MediaCreator::new(
        state.store.as_ref(),
        state.spam.as_ref(),
        state.limits(),
        &visitor,
        media_temp,
    );
    creator.set_container(&container);
    creator.set_title(&form.title, &form.description);
    creator.set_attachment(attachment.attachment_id, &attachment.temp_hash);
    creator.check_for_spam();

    if let Err(errors) = creator.validate() {
        discard_upload(&state, &attachment);
        return Err(ApiError::ValidationFailed(errors));
    }

    let item = match creator.save() {
        Ok(item) => item,
        Err(e) => {
            discard_upload(&state, &attachment);
            return Err(e.into());
        }
    };

    // The attachment row was claimed during save; cached copies are stale.
    state.store.detach(EntityKey::Media(item.media_id));
    state.store.detach(EntityKey::Attachment(attachment.attachment_id));

    single(&state, &visitor, item.media_id)
}

/// PUT /media/:media_id
pub async fn put_index(
    State(state): State<Arc<AppState>>,
    CurrentVisitor(visitor): CurrentVisitor,
    path: Result<Path<u32>, PathRejection>,
    Query(query): Query<EditParams>,
    form: Option<Form<EditParams>>,
) -> AppResult<Response> {
    let media_id = media_id_from(path)?;
    let item = assert_viewable_item(&state, &visitor, media_id)?;
    ensure(state.permissions.can_edit_media(&visitor, &item))?;

    let params = form
        .map(|Form(body)| body)
        .unwrap_or_default()
        .merge(query);

    let mut editor = MediaEditor::new(
        state.store.as_ref(),
        state.spam.as_ref(),
        state.limits(),
        &visitor,
        item,
    );
    editor.set_title(params.title.as_deref(), params.description.as_deref());
    editor.check_for_spam();

    if let Err(errors) = editor.validate() {
        return Err(ApiError::ValidationFailed(errors));
    }

    let item = editor.save()?;

    single(&state, &visitor, item.media_id)
}

/// GET /media/:media_id/data
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    CurrentVisitor(visitor): CurrentVisitor,
    path: Result<Path<u32>, PathRejection>,
) -> AppResult<Response> {
    let media_id = media_id_from(path)?;
    let item = assert_viewable_item(&state, &visitor, media_id)?;
    let attachment = state
        .store
        .find_attachment(item.attachment_id)?
        .ok_or_else(|| ApiError::not_found(MEDIA_NOT_FOUND))?;

    let data_path = state.attachments.data_path(&attachment);
    let file = tokio::fs::File::open(&data_path).await.map_err(|e| {
        tracing::warn!(media_id, path = %data_path.display(), "Attachment data missing: {}", e);
        ApiError::not_found(MEDIA_NOT_FOUND)
    })?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        attachment.filename.replace(['"', '\\'], "")
    );
    let headers = [
        (header::CONTENT_TYPE, attachment.mime_type),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

fn discard_upload(state: &AppState, attachment: &Attachment) {
    if let Err(e) = state.attachments.discard(attachment) {
        tracing::warn!(
            attachment_id = attachment.attachment_id,
            "Could not discard pending upload: {:?}",
            e
        );
    }
}

fn single(state: &AppState, visitor: &Visitor, media_id: u32) -> AppResult<Response> {
    let item = assert_viewable_item(state, visitor, media_id)?;

    let transformer = MediaTransformer::new(
        state.store.as_ref(),
        state.permissions.as_ref(),
        visitor,
        state.base_url(),
    );
    let view = transformer.transform(&item)?;

    Ok(Json(serde_json::json!({ "item": view })).into_response())
}

fn assert_viewable_item(state: &AppState, visitor: &Visitor, media_id: u32) -> AppResult<MediaItem> {
    let item = state
        .store
        .find_media(media_id)?
        .ok_or_else(|| ApiError::not_found(MEDIA_NOT_FOUND))?;
    ensure(state.permissions.can_view_media(visitor, &item)?)?;
    Ok(item)
}

fn assert_viewable_album(state: &AppState, visitor: &Visitor, album_id: u32) -> AppResult<Album> {
    let album = state
        .store
        .find_album(album_id)?
        .ok_or_else(|| ApiError::not_found(ALBUM_NOT_FOUND))?;
    ensure(state.permissions.can_view_album(visitor, &album))?;
    Ok(album)
}

fn assert_viewable_category(
    state: &AppState,
    visitor: &Visitor,
    category_id: u32,
) -> AppResult<Category> {
    let category = state
        .store
        .find_category(category_id)?
        .ok_or_else(|| ApiError::not_found(CATEGORY_NOT_FOUND))?;
    ensure(state.permissions.can_view_category(visitor, &category))?;
    Ok(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_parsing_is_forgiving() {
        assert_eq!(parse_uint(" 12 "), 12);
        assert_eq!(parse_uint(""), 0);
        assert_eq!(parse_uint("-3"), 0);
        assert_eq!(parse_uint("abc"), 0);
    }

    #[test]
    fn body_fields_override_query_fields() {
        let body = EditParams {
            title: Some("Body".to_string()),
            description: None,
        };
        let query = EditParams {
            title: Some("Query".to_string()),
            description: Some("From query".to_string()),
        };
        let merged = body.merge(query);
        assert_eq!(merged.title.as_deref(), Some("Body"));
        assert_eq!(merged.description.as_deref(), Some("From query"));
    }
}
