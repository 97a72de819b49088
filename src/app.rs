use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::accessor::{Accessor, WriteTarget};
use crate::config::{ImsConfig, SheetType};
use crate::downloader;
use crate::error::StoreError;
use crate::normalize::normalize;
use crate::records;
use crate::schema::{FormCatalog, FormSchema, FormSubmission};
use crate::store::FileStore;

pub struct AppState {
    config: ImsConfig,
    accessor: Accessor<FileStore>,
    catalogs: HashMap<String, FormCatalog>,
}

impl AppState {
    /// Load every sheet type's form catalog and open the local store.
    pub fn new(config: ImsConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = FileStore::new(config.data_dir());
        let mut catalogs = HashMap::new();
        for sheet_type in &config.sheet_types {
            catalogs.insert(sheet_type.name.clone(), config.load_forms(sheet_type)?);
            store.create_store(&sheet_type.store_id)?;
        }
        let accessor = Accessor::new(store, config.access_settings());
        Ok(AppState {
            config,
            accessor,
            catalogs,
        })
    }

    fn sheet_type(&self, name: &str) -> Result<(&SheetType, &FormCatalog), ApiError> {
        let sheet_type = self
            .config
            .sheet_type(name)
            .map_err(|e| ApiError::NotFound(e.to_string()))?;
        let catalog = self
            .catalogs
            .get(&sheet_type.name)
            .ok_or_else(|| ApiError::NotFound(format!("no forms for '{}'", sheet_type.name)))?;
        Ok((sheet_type, catalog))
    }

    fn form(&self, name: &str, form_id: &str) -> Result<(&SheetType, &FormSchema), ApiError> {
        let (sheet_type, catalog) = self.sheet_type(name)?;
        let schema = catalog
            .get(form_id)
            .ok_or_else(|| ApiError::NotFound(format!("unknown form '{}'", form_id)))?;
        Ok((sheet_type, schema))
    }
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Store(StoreError),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
            ApiError::Store(e) => (status_for(&e), e.to_string()),
        };
        if status.is_server_error() {
            log::error!("{}: {}", status, message);
        }
        (
            status,
            Json(ErrorResponse {
                status: "error".to_string(),
                message,
            }),
        )
            .into_response()
    }
}

fn status_for(error: &StoreError) -> StatusCode {
    match error {
        StoreError::InvalidRow(_) | StoreError::NoHeaderRow(_) => StatusCode::BAD_REQUEST,
        StoreError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Remote(r) if r.status == Some(404) => StatusCode::NOT_FOUND,
        StoreError::Remote(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Run store work off the async workers; the accessor sleeps on its thread.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

#[derive(Serialize)]
struct SheetTypeResponse {
    name: String,
    store_id: String,
    forms: usize,
}

#[derive(Serialize)]
struct FormResponse {
    id: String,
    title: String,
    fields: Vec<String>,
    signatures: Vec<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct RowResponse {
    row: u32,
    values: Vec<String>,
}

#[derive(Serialize)]
struct WorksheetResponse {
    headers: Vec<String>,
    total: usize,
    rows: Vec<RowResponse>,
}

#[derive(Deserialize)]
struct EntryRequest {
    #[serde(flatten)]
    submission: FormSubmission,
    /// Sheet row to overwrite; appends when absent
    row: Option<u32>,
}

#[derive(Serialize)]
struct EntryResponse {
    status: String,
    written: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sheet-types", get(list_sheet_types))
        .route("/api/usage", get(quota_usage))
        .route("/api/:sheet_type/forms", get(list_forms))
        .route("/api/:sheet_type/worksheets", get(list_worksheets))
        .route("/api/:sheet_type/worksheets/:name", get(get_worksheet))
        .route("/api/:sheet_type/worksheets/:name/export.csv", get(export_csv))
        .route("/api/:sheet_type/worksheets/:name/export.xlsx", get(export_xlsx))
        .route("/api/:sheet_type/forms/:form/report", get(form_report))
        .route("/api/:sheet_type/forms/:form/entries", post(submit_entry))
        .route("/api/:sheet_type/forms/:form/entries/:row", get(get_entry))
        .route("/api/:sheet_type/refresh", post(refresh))
        .with_state(state)
}

pub async fn run(config: ImsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind).await?;
    log::info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_sheet_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let types: Vec<SheetTypeResponse> = state
        .config
        .sheet_types
        .iter()
        .map(|t| SheetTypeResponse {
            name: t.name.clone(),
            store_id: t.store_id.clone(),
            forms: state.catalogs.get(&t.name).map_or(0, FormCatalog::len),
        })
        .collect();
    Json(types)
}

async fn quota_usage(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.accessor.quota_usage())
}

async fn list_forms(
    Path(sheet_type): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FormResponse>>, ApiError> {
    let (_, catalog) = state.sheet_type(&sheet_type)?;
    let forms = catalog
        .iter()
        .map(|(id, schema)| FormResponse {
            id: id.to_string(),
            title: schema.title.clone(),
            fields: schema.fields.clone(),
            signatures: schema.signatures.clone(),
        })
        .collect();
    Ok(Json(forms))
}

async fn list_worksheets(
    Path(sheet_type): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    blocking(move || {
        let (t, _) = state.sheet_type(&sheet_type)?;
        Ok(Json(state.accessor.list_worksheets(&t.store_id)?))
    })
    .await
}

async fn get_worksheet(
    Path((sheet_type, name)): Path<(String, String)>,
    Query(query): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<WorksheetResponse>, ApiError> {
    blocking(move || {
        let (t, _) = state.sheet_type(&sheet_type)?;
        let data = state.accessor.read(&name, &t.store_id)?;
        let term = query.q.unwrap_or_default();
        let rows = records::search(&data.records, &term)
            .into_iter()
            .map(|hit| RowResponse {
                row: hit.row,
                values: data
                    .row_cells(hit.record)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        Ok(Json(WorksheetResponse {
            total: data.records.len(),
            headers: data.headers,
            rows,
        }))
    })
    .await
}

async fn export_csv(
    Path((sheet_type, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (csv, name) = blocking(move || {
        let (t, _) = state.sheet_type(&sheet_type)?;
        let data = state.accessor.read(&name, &t.store_id)?;
        Ok((downloader::to_csv(&data), name))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", name.replace('"', "")),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn export_xlsx(
    Path((sheet_type, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (bytes, name) = blocking(move || {
        let (t, _) = state.sheet_type(&sheet_type)?;
        let data = state.accessor.read(&name, &t.store_id)?;
        let bytes = downloader::to_xlsx(&data, &name)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok((bytes, name))
    })
    .await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.xlsx\"", name.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn form_report(
    Path((sheet_type, form)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        let (t, schema) = state.form(&sheet_type, &form)?;
        Ok(Json(state.accessor.reconcile(schema, &form, &t.store_id)?))
    })
    .await
}

async fn get_entry(
    Path((sheet_type, form, row)): Path<(String, String, u32)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<FormSubmission>, ApiError> {
    blocking(move || {
        let (t, schema) = state.form(&sheet_type, &form)?;
        let data = state.accessor.read(&form, &t.store_id)?;
        let record = data
            .record_at(row)
            .ok_or_else(|| ApiError::NotFound(format!("no entry at row {}", row)))?;
        Ok(Json(schema.prefill(record)))
    })
    .await
}

async fn submit_entry(
    Path((sheet_type, form)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EntryRequest>,
) -> Result<Json<EntryResponse>, ApiError> {
    blocking(move || {
        let (t, schema) = state.form(&sheet_type, &form)?;
        let expected: HashSet<String> = schema
            .expected_headers()
            .iter()
            .map(|h| normalize(h))
            .collect();
        let unknown: Vec<&String> = payload
            .submission
            .fields
            .keys()
            .chain(payload.submission.signatures.keys())
            .filter(|name| !expected.contains(&normalize(name)))
            .collect();
        if !unknown.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "not fields of '{}': {:?}",
                form, unknown
            )));
        }

        let target = match payload.row {
            Some(row) => WriteTarget::Row(row),
            None => WriteTarget::Append,
        };
        let mut submission = payload.submission;
        schema.complete(&mut submission);
        let values = submission.at(Local::now()).into_values();
        let written = state.accessor.submit(&form, &t.store_id, target, &values)?;
        Ok(Json(EntryResponse {
            status: "ok".to_string(),
            written,
        }))
    })
    .await
}

async fn refresh(
    Path(sheet_type): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let (t, _) = state.sheet_type(&sheet_type)?;
    state.accessor.invalidate_store(&t.store_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::records::{NOT_SIGNED, SIGNED};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const FORMS_JSON: &str = r#"{
        "LW4 03": {
            "title": "Receipt",
            "fields": ["Date", "Item"],
            "signatures": ["Signed by SSE", "Signed by CSO"]
        }
    }"#;

    // Helper function to build app state over a fresh data directory
    fn setup() -> (TempDir, Arc<AppState>) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("forms.json"), FORMS_JSON).unwrap();
        let config_path = dir.path().join("ims.json");
        fs::write(
            &config_path,
            r#"{"sheet_types": [{"name": "LW FILES", "store_id": "lw-files", "forms": "forms.json"}],
                "quota": {"min_interval_ms": 0}}"#,
        )
        .unwrap();

        let state = AppState::new(ImsConfig::load(&config_path).unwrap()).unwrap();
        let headers = FormCatalog::load(dir.path().join("forms.json"))
            .unwrap()
            .get("LW4 03")
            .unwrap()
            .expected_headers();
        state
            .accessor
            .create_worksheet("LW4 03", "lw-files", &headers)
            .unwrap();
        (dir, Arc::new(state))
    }

    // Helper function to post an entry and reduce the outcome to a status
    async fn submit(
        state: &Arc<AppState>,
        sheet_type: &str,
        form: &str,
        submission: FormSubmission,
        row: Option<u32>,
    ) -> Result<Vec<String>, StatusCode> {
        let result = submit_entry(
            Path((sheet_type.to_string(), form.to_string())),
            State(Arc::clone(state)),
            Json(EntryRequest { submission, row }),
        )
        .await;
        match result {
            Ok(Json(body)) => Ok(body.written),
            Err(e) => Err(e.into_response().status()),
        }
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        assert_eq!(status_for(&StoreError::InvalidRow(1)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&StoreError::NoHeaderRow("LW4 03".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StoreError::RetriesExhausted {
                attempts: 5,
                last: RemoteError::rate_limited(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&StoreError::Remote(RemoteError::not_found("worksheet 'X'"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StoreError::Remote(RemoteError::new(Some(500), "backend error"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&StoreError::Remote(RemoteError::new(None, "connection reset"))),
            StatusCode::BAD_GATEWAY
        );

        let not_found = ApiError::NotFound("unknown form".to_string()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let bad = ApiError::BadRequest("bad field".to_string()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_requests() {
        let (_dir, state) = setup();

        let unknown_field = FormSubmission::new().field("Date", "2025-08-05").field("Colour", "red");
        assert_eq!(
            submit(&state, "LW FILES", "LW4 03", unknown_field, None).await,
            Err(StatusCode::BAD_REQUEST)
        );

        let entry = FormSubmission::new().field("Date", "2025-08-05");
        assert_eq!(
            submit(&state, "LW FILES", "LW4 99", entry.clone(), None).await,
            Err(StatusCode::NOT_FOUND)
        );
        assert_eq!(
            submit(&state, "XYZ FILES", "LW4 03", entry.clone(), None).await,
            Err(StatusCode::NOT_FOUND)
        );
        // Row 1 is the header row
        assert_eq!(
            submit(&state, "LW FILES", "LW4 03", entry, Some(1)).await,
            Err(StatusCode::BAD_REQUEST)
        );

        // Nothing above reached the worksheet
        assert!(state.accessor.read("LW4 03", "lw-files").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_matches_names_loosely_and_fills_signers() {
        let (_dir, state) = setup();

        let entry = FormSubmission::new()
            .field("date ", "2025-08-05")
            .field("Item", "Bolt")
            .sign("signed by sse", true);
        let written = submit(&state, "lw-files", "LW4 03", entry, None).await;

        // Names differing only in case or spacing land in their columns
        assert_eq!(
            written,
            Ok(vec![
                "2025-08-05".to_string(),
                "Bolt".to_string(),
                SIGNED.to_string(),
                NOT_SIGNED.to_string(),
            ])
        );
        let data = state.accessor.read("LW4 03", "lw-files").unwrap();
        assert_eq!(data.records.len(), 1);
        assert_eq!(data.records[0]["Signed by CSO"], NOT_SIGNED);
    }
}
