use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response, StatusCode, Url, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{
        COUNTDOWN_TABLE, ChangeEvent, ChangeKind, CountdownSettingsEntity,
        CountdownSettingsPatch, NewCountdownSettings,
    },
    settings_store::{CHANGE_CHANNEL_CAPACITY, ChangeSubscription, SettingsStore},
    storage::StorageResult,
};

use super::{
    config::PostgrestConfig,
    error::{PostgrestError, PostgrestResult},
    watcher::{self, RowFingerprint},
};

const RESET_FUNCTION: &str = "rpc/reset_countdown";
const CLIENT_INFO: &str = "countdown-back";
const RETURN_REPRESENTATION: &str = "return=representation";
const LATEST_ORDER: &str = "created_at.desc.nullslast";

/// Settings store talking to a PostgREST (Supabase) endpoint over HTTP.
#[derive(Clone)]
pub struct PostgrestSettingsStore {
    client: Client,
    rest_root: Arc<Url>,
    api_key: Arc<str>,
    poll_interval: Duration,
    changes: broadcast::Sender<ChangeEvent>,
}

/// Body PostgREST sends alongside 4xx answers.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResetArgs {
    hours_from_now: u32,
}

impl PostgrestSettingsStore {
    /// Build the HTTP client. No request is sent until the store is used.
    pub fn new(config: PostgrestConfig) -> PostgrestResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| PostgrestError::ClientBuilder { source })?;
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            rest_root: Arc::new(config.rest_root()),
            api_key: Arc::from(config.api_key.as_str()),
            poll_interval: config.poll_interval,
            changes,
        })
    }

    fn request(&self, method: Method, path: &str) -> PostgrestResult<reqwest::RequestBuilder> {
        let url = self
            .rest_root
            .join(path)
            .map_err(|err| PostgrestError::InvalidPath {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref())
            .header("X-Client-Info", CLIENT_INFO)
            .header(header::ACCEPT, "application/json"))
    }

    async fn send(&self, path: &str, builder: reqwest::RequestBuilder) -> PostgrestResult<Response> {
        let response = builder.send().await.map_err(|source| {
            if source.is_timeout() {
                PostgrestError::Timeout {
                    path: path.to_string(),
                }
            } else {
                PostgrestError::RequestSend {
                    path: path.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(PostgrestError::Unauthorized {
                path: path.to_string(),
                status,
            });
        }

        if is_rejection(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(PostgrestError::Rejected {
                path: path.to_string(),
                status,
                message: rejection_message(status, &body),
            });
        }

        Err(PostgrestError::RequestStatus {
            path: path.to_string(),
            status,
        })
    }

    async fn decode<T>(&self, path: &str, response: Response) -> PostgrestResult<T>
    where
        T: DeserializeOwned,
    {
        response.json::<T>().await.map_err(|source| {
            if source.is_timeout() {
                PostgrestError::Timeout {
                    path: path.to_string(),
                }
            } else {
                PostgrestError::DecodeResponse {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }

    async fn fetch_latest(&self) -> PostgrestResult<Option<CountdownSettingsEntity>> {
        let builder = self.request(Method::GET, COUNTDOWN_TABLE)?.query(&[
            ("select", "*"),
            ("order", LATEST_ORDER),
            ("limit", "1"),
        ]);
        let response = self.send(COUNTDOWN_TABLE, builder).await?;
        let rows: Vec<CountdownSettingsEntity> = self.decode(COUNTDOWN_TABLE, response).await?;
        Ok(rows.into_iter().next())
    }

    /// Identity of the current row, used by the change watcher.
    pub(super) async fn fetch_fingerprint(&self) -> PostgrestResult<Option<RowFingerprint>> {
        let builder = self.request(Method::GET, COUNTDOWN_TABLE)?.query(&[
            ("select", watcher::FINGERPRINT_COLUMNS),
            ("order", LATEST_ORDER),
            ("limit", "1"),
        ]);
        let response = self.send(COUNTDOWN_TABLE, builder).await?;
        let rows: Vec<RowFingerprint> = self.decode(COUNTDOWN_TABLE, response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_row(&self, settings: &NewCountdownSettings) -> PostgrestResult<CountdownSettingsEntity> {
        let builder = self
            .request(Method::POST, COUNTDOWN_TABLE)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(settings);
        let response = self.send(COUNTDOWN_TABLE, builder).await?;
        let rows: Vec<CountdownSettingsEntity> = self.decode(COUNTDOWN_TABLE, response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PostgrestError::MissingRow {
                path: COUNTDOWN_TABLE.to_string(),
            })
    }

    async fn update_row(
        &self,
        id: Uuid,
        patch: &CountdownSettingsPatch,
    ) -> PostgrestResult<CountdownSettingsEntity> {
        let filter = format!("eq.{id}");
        let path = format!("{COUNTDOWN_TABLE}?id={filter}");
        let builder = self
            .request(Method::PATCH, COUNTDOWN_TABLE)?
            .query(&[("id", filter.as_str())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        let response = self.send(&path, builder).await?;
        let rows: Vec<CountdownSettingsEntity> = self.decode(&path, response).await?;
        rows.into_iter()
            .next()
            .ok_or(PostgrestError::MissingRow { path })
    }

    async fn call_reset(&self, hours_from_now: u32) -> PostgrestResult<CountdownSettingsEntity> {
        let builder = self
            .request(Method::POST, RESET_FUNCTION)?
            .json(&ResetArgs { hours_from_now });
        let response = self.send(RESET_FUNCTION, builder).await?;
        let value: Value = self.decode(RESET_FUNCTION, response).await?;
        decode_function_row(RESET_FUNCTION, value)
    }

    async fn ping(&self) -> PostgrestResult<()> {
        let builder = self
            .request(Method::GET, COUNTDOWN_TABLE)?
            .query(&[("select", "id"), ("limit", "1")]);
        self.send(COUNTDOWN_TABLE, builder).await.map(|_| ())
    }

    fn announce(&self, kind: ChangeKind, id: Uuid) {
        let _ = self.changes.send(ChangeEvent::countdown(kind, Some(id)));
    }
}

/// Statuses that mean the store understood and refused the payload.
fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    match (parsed.message, parsed.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.to_string(),
    }
}

/// Function calls return either an object or a one-element array; a null row means nothing matched.
fn decode_function_row(path: &str, value: Value) -> PostgrestResult<CountdownSettingsEntity> {
    let value = match value {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    let missing = value
        .get("id")
        .is_none_or(Value::is_null);
    if missing {
        return Err(PostgrestError::MissingRow {
            path: path.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|source| PostgrestError::DeserializeValue {
        path: path.to_string(),
        source,
    })
}

impl SettingsStore for PostgrestSettingsStore {
    fn latest(&self) -> BoxFuture<'static, StorageResult<Option<CountdownSettingsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_latest().await.map_err(Into::into) })
    }

    fn insert(
        &self,
        settings: NewCountdownSettings,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let row = store.insert_row(&settings).await?;
            debug!(id = %row.id, "inserted countdown row");
            store.announce(ChangeKind::Insert, row.id);
            Ok(row)
        })
    }

    fn update(
        &self,
        id: Uuid,
        patch: CountdownSettingsPatch,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let row = store.update_row(id, &patch).await?;
            store.announce(ChangeKind::Update, row.id);
            Ok(row)
        })
    }

    fn reset_countdown(
        &self,
        hours_from_now: u32,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let row = store.call_reset(hours_from_now).await?;
            store.announce(ChangeKind::Update, row.id);
            Ok(row)
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn subscribe(&self) -> ChangeSubscription {
        let (tx, rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let local = self.changes.subscribe();
        let watcher = tokio::spawn(watcher::run(self.clone(), self.poll_interval, local, tx));
        ChangeSubscription::new(rx).with_watcher(watcher)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        clock::SystemClock,
        config::BootstrapDefaults,
        dao::{settings_store::StoreHandle, storage::StorageError},
        state::engine::{CountdownEngine, EngineError, EnginePhase, ErrorKind},
    };

    /// Local HTTP server answering every request with `status`.
    async fn answering(status: StatusCode) -> String {
        let app = axum::Router::new().fallback(move || async move { status });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn rejection_message_prefers_store_explanation() {
        let body = json!({
            "code": "23514",
            "message": "new row for relation \"countdown_settings\" violates check constraint",
            "details": "Failing row contains (...)",
            "hint": null
        })
        .to_string();
        assert_eq!(
            rejection_message(StatusCode::BAD_REQUEST, &body),
            "new row for relation \"countdown_settings\" violates check constraint (Failing row contains (...))"
        );
    }

    #[test]
    fn rejection_message_falls_back_to_raw_body_or_status() {
        assert_eq!(
            rejection_message(StatusCode::CONFLICT, "duplicate key"),
            "duplicate key"
        );
        assert_eq!(
            rejection_message(StatusCode::UNPROCESSABLE_ENTITY, ""),
            StatusCode::UNPROCESSABLE_ENTITY.to_string()
        );
    }

    #[test]
    fn only_client_errors_count_as_rejections() {
        assert!(is_rejection(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_rejection(StatusCode::UNAUTHORIZED));
        assert!(!is_rejection(StatusCode::FORBIDDEN));
        assert!(!is_rejection(StatusCode::NOT_FOUND));
        assert!(!is_rejection(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn function_row_accepts_object_or_array() {
        let row = json!({
            "id": "0f8b8c56-4a3e-4d1e-9a52-1d2f0c7b9e11",
            "target_date": "2025-09-01T10:00:00+00:00",
            "is_active": true,
            "title": "Reset",
            "description": null,
            "created_at": null,
            "updated_at": "2025-08-31T10:00:00.5+00:00",
            "created_by": null
        });
        let decoded = decode_function_row(RESET_FUNCTION, row.clone()).unwrap();
        assert_eq!(decoded.title, "Reset");

        let decoded = decode_function_row(RESET_FUNCTION, json!([row])).unwrap();
        assert!(decoded.is_active);
    }

    #[test]
    fn function_row_with_null_id_means_nothing_matched() {
        let err = decode_function_row(RESET_FUNCTION, json!({ "id": null })).unwrap_err();
        assert!(matches!(err, PostgrestError::MissingRow { .. }));

        let err = decode_function_row(RESET_FUNCTION, Value::Null).unwrap_err();
        assert!(matches!(err, PostgrestError::MissingRow { .. }));
    }

    #[tokio::test]
    async fn building_a_store_sends_nothing() {
        let config = PostgrestConfig::new("http://127.0.0.1:9", "anon-key").unwrap();
        let store = PostgrestSettingsStore::new(config).unwrap();
        let request = store
            .request(Method::GET, COUNTDOWN_TABLE)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "http://127.0.0.1:9/rest/v1/countdown_settings"
        );
        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer anon-key");
    }

    #[tokio::test]
    async fn refused_key_is_a_configuration_failure_not_a_rejection() {
        let base = answering(StatusCode::UNAUTHORIZED).await;
        let store =
            PostgrestSettingsStore::new(PostgrestConfig::new(&base, "revoked-key").unwrap())
                .unwrap();

        let err = store.latest().await.unwrap_err();
        assert!(matches!(err, StorageError::Unauthorized { .. }));

        let engine = CountdownEngine::new(
            StoreHandle::connected(store),
            Arc::new(SystemClock),
            BootstrapDefaults::default(),
            Duration::from_secs(5),
        );
        let err = engine.load().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.disconnects());

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.phase, EnginePhase::Errored);
        assert!(!snapshot.connected);
        assert!(matches!(snapshot.error, Some(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn forbidden_key_fails_the_health_check_as_configuration() {
        let base = answering(StatusCode::FORBIDDEN).await;
        let store =
            PostgrestSettingsStore::new(PostgrestConfig::new(&base, "anon-key").unwrap()).unwrap();

        let err = EngineError::from(store.probe().await.unwrap_err());
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
