use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};

use medidocs_core::birth_date;
use medidocs_core::config::{
    extended_fields_from_env_value, log_file_from_env_value, normalize_font_from_env_value,
    output_dir_from_env_value, templates_dir_from_env_value,
};
use medidocs_core::{
    Category, CoreConfig, CoreError, DocumentGenerator, GenerationOutput, GenerationReport,
    OutputTarget, PatientForm, PatientLog, RenderOptions, Session, TemplateCatalog, TemplateRef,
    initialise_workspace,
};

const GENERATED_COUNT: HeaderName = HeaderName::from_static("x-generated-count");
const FAILED_COUNT: HeaderName = HeaderName::from_static("x-failed-count");

/// Application state shared across REST API handlers
///
/// Holds the configuration resolved at startup and the generator built from it.
#[derive(Clone)]
struct AppState {
    cfg: Arc<CoreConfig>,
    generator: DocumentGenerator,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct TemplateItem {
    /// `Category:filename`, the value to send back in `GenerateReq::templates`
    key: String,
    label: String,
    filename: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CategoryTemplates {
    category: String,
    templates: Vec<TemplateItem>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListTemplatesRes {
    categories: Vec<CategoryTemplates>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct DerivedReq {
    birth_date: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct DerivedRes {
    age: String,
    registration_code: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct GenerateReq {
    /// Patient form; every field is optional
    #[schema(value_type = Object)]
    form: PatientForm,
    /// Selected templates as `Category:filename`
    templates: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ErrorRes {
    error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct HistoryRes {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_templates, derived_fields, generate_documents, history),
    components(schemas(
        HealthRes,
        TemplateItem,
        CategoryTemplates,
        ListTemplatesRes,
        DerivedReq,
        DerivedRes,
        GenerateReq,
        ErrorRes,
        HistoryRes
    ))
)]
struct ApiDoc;

type ApiError = (StatusCode, Json<ErrorRes>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorRes {
            error: error.to_string(),
            errors: Vec::new(),
        }),
    )
}

/// Main entry point for the medidocs web service
///
/// Serves the REST API that fills document templates and returns them as a zip archive.
///
/// # Environment Variables
/// - `MEDIDOCS_REST_ADDR`: listen address (default: "0.0.0.0:3000")
/// - `MEDIDOCS_TEMPLATES_DIR`: templates root (default: "PLANTILLAS")
/// - `MEDIDOCS_LOG_FILE`: patient log (default: "pacientes.csv")
/// - `MEDIDOCS_OUTPUT_DIR`: output directory (default: ".")
/// - `MEDIDOCS_EXTENDED_FIELDS`: fill the extended placeholder set (default: false)
/// - `MEDIDOCS_NORMALIZE_FONT`: `Face:size` or `none` (default: "Arial:10")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medidocs=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(config_from_env()?);
    initialise_workspace(&cfg)?;

    let rest_addr =
        std::env::var("MEDIDOCS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting medidocs REST on {}", rest_addr);
    tracing::info!("++ Templates: {}", cfg.templates_dir().display());

    let app = app(cfg);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let var = |name: &str| std::env::var(name).ok();
    let render = RenderOptions {
        extended_fields: extended_fields_from_env_value(var("MEDIDOCS_EXTENDED_FIELDS"))?,
        normalize_font: normalize_font_from_env_value(var("MEDIDOCS_NORMALIZE_FONT"))?,
    };
    Ok(CoreConfig::new(
        templates_dir_from_env_value(var("MEDIDOCS_TEMPLATES_DIR")),
        log_file_from_env_value(var("MEDIDOCS_LOG_FILE")),
        output_dir_from_env_value(var("MEDIDOCS_OUTPUT_DIR")),
        render,
    )?)
}

fn app(cfg: Arc<CoreConfig>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates))
        .route("/derived", post(derived_fields))
        .route("/documents", post(generate_documents))
        .route("/history", get(history))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(AppState {
            generator: DocumentGenerator::new(cfg.clone()),
            cfg,
        })
}

/// Runs blocking core work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("blocking task failed: {:?}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "medidocs is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Templates grouped by category", body = ListTemplatesRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List the templates available under the templates root
///
/// Categories are returned in their fixed order; empty categories are included so clients
/// can render every section.
async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<ListTemplatesRes>, ApiError> {
    let cfg = state.cfg.clone();
    let catalog = blocking(move || {
        TemplateCatalog::scan(cfg.templates_dir()).map_err(|e| {
            tracing::error!("Template scan error: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })
    })
    .await?;

    let categories = Category::ALL
        .into_iter()
        .map(|category| CategoryTemplates {
            category: category.to_string(),
            templates: catalog
                .in_category(category)
                .map(|t| TemplateItem {
                    key: t.to_string(),
                    label: t.label().to_string(),
                    filename: t.filename.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(Json(ListTemplatesRes { categories }))
}

#[utoipa::path(
    post,
    path = "/derived",
    request_body = DerivedReq,
    responses(
        (status = 200, description = "Age and registration code; empty strings when the date cannot be read", body = DerivedRes)
    )
)]
/// Compute the fields derived from a birth date
async fn derived_fields(Json(req): Json<DerivedReq>) -> Json<DerivedRes> {
    let derived = birth_date::derive(&req.birth_date, Local::now().date_naive());
    Json(DerivedRes {
        age: derived.age,
        registration_code: derived.registration_code,
    })
}

#[utoipa::path(
    post,
    path = "/documents",
    request_body = GenerateReq,
    responses(
        (status = 200, description = "Zip archive with the generated documents", content_type = "application/zip"),
        (status = 400, description = "Malformed template key", body = ErrorRes),
        (status = 422, description = "Validation failed or no document could be generated", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Fill the selected templates and download them as one zip archive
///
/// Per-template failures do not fail the request; their count is returned in
/// `X-Failed-Count`. The batch is recorded in the patient log.
async fn generate_documents(
    State(state): State<AppState>,
    Json(req): Json<GenerateReq>,
) -> Result<Response, ApiError> {
    let keys = req
        .templates
        .iter()
        .map(|key| key.parse::<TemplateRef>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let cfg = state.cfg.clone();
    let generator = state.generator.clone();
    let report = blocking(move || {
        let today = Local::now().date_naive();
        let catalog = TemplateCatalog::scan(cfg.templates_dir())
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

        let mut session = Session::new(&catalog, today);
        session.form = req.form;
        session.form.refresh_derived(today);

        let mut unknown = Vec::new();
        for template in keys {
            if !session.selection.set(&template, true) && !unknown.contains(&template) {
                unknown.push(template);
            }
        }
        let mut selected = session.selected_templates();
        selected.extend(unknown);

        generator
            .generate(&session.form, &selected, OutputTarget::Archive)
            .map_err(generation_error)
    })
    .await?;

    archive_response(report)
}

fn generation_error(e: CoreError) -> ApiError {
    match e {
        CoreError::Validation(v) => api_error(StatusCode::UNPROCESSABLE_ENTITY, v),
        CoreError::NothingGenerated { errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorRes {
                error: "no documents were generated".into(),
                errors,
            }),
        ),
        other => {
            tracing::error!("Generate documents error: {:?}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}

fn archive_response(report: GenerationReport) -> Result<Response, ApiError> {
    let generated = report.generated.len().to_string();
    let failed = report.failures.len().to_string();
    if let Some(warning) = &report.log_warning {
        tracing::warn!("{}", warning);
    }

    let GenerationOutput::Archive { name, bytes } = report.output else {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "generator did not produce an archive",
        ));
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&name)),
            (GENERATED_COUNT, generated),
            (FAILED_COUNT, failed),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// `attachment` disposition with an ASCII `filename` fallback and the UTF-8 name in
/// `filename*` (RFC 6266).
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}

#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Patient log rows", body = HistoryRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Read the patient log
async fn history(State(state): State<AppState>) -> Result<Json<HistoryRes>, ApiError> {
    let cfg = state.cfg.clone();
    let table = blocking(move || {
        PatientLog::new(cfg.log_file(), cfg.render().extended_fields)
            .read_all()
            .map_err(|e| {
                tracing::error!("History read error: {}", e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
            })
    })
    .await?;

    Ok(Json(HistoryRes {
        columns: table.columns,
        rows: table.rows,
    }))
}
