use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use super::store::{ImageChange, Meal, MealPatch, MealStore, NewMeal, StoreError, StoreInfo};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PROP_NAME: &str = "Name";
const PROP_PROTEIN: &str = "Protein";
const PROP_VEG_FRUIT: &str = "Veg/Fruit";
const PROP_CARB: &str = "Carb";
const PROP_OTHER: &str = "Other Ingredients";
const PROP_IMAGE: &str = "Image";

const UNNAMED_MEAL: &str = "Unnamed Meal";

/// Meal records kept as pages of a Notion database.
pub struct NotionStore {
    http: reqwest::Client,
    token: String,
    database_id: String,
}

impl NotionStore {
    pub fn new(token: &str, database_id: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build notion http client")?;
        Ok(Self {
            http,
            token: token.to_string(),
            database_id: database_id.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{NOTION_API}/{path}"))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, StoreError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .context("decode notion response")
                .map_err(StoreError::Internal);
        }
        let body = resp.json::<ApiError>().await.unwrap_or_default();
        warn!(%status, code = %body.code, message = %body.message, "notion request failed");
        Err(classify_api_error(status.as_u16(), body))
    }

    async fn retrieve(&self, page_id: &str) -> Result<Meal, StoreError> {
        let page: Page = self
            .send(self.request(Method::GET, &format!("pages/{page_id}")))
            .await?;
        Ok(page_to_meal(page))
    }
}

#[async_trait]
impl MealStore for NotionStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Meal>, StoreError> {
        let mut meals = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({
                "filter": { "property": PROP_NAME, "title": { "is_not_empty": true } },
                "page_size": 100,
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let page: QueryResponse = self
                .send(
                    self.request(Method::POST, &format!("databases/{}/query", self.database_id))
                        .json(&body),
                )
                .await?;
            meals.extend(page.results.into_iter().map(page_to_meal));
            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = meals.len(), "fetched meals from notion");
        Ok(meals)
    }

    #[instrument(skip(self, meal), fields(name = %meal.name))]
    async fn create(&self, meal: NewMeal) -> Result<String, StoreError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": create_properties(&meal),
        });
        let created: Created = self
            .send(self.request(Method::POST, "pages").json(&body))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: MealPatch) -> Result<Meal, StoreError> {
        let body = json!({ "properties": patch_properties(&patch) });
        let _: Value = self
            .send(self.request(Method::PATCH, &format!("pages/{id}")).json(&body))
            .await?;
        self.retrieve(id).await
    }

    #[instrument(skip(self))]
    async fn archive(&self, id: &str) -> Result<(), StoreError> {
        let _: Value = self
            .send(
                self.request(Method::PATCH, &format!("pages/{id}"))
                    .json(&json!({ "archived": true })),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn describe(&self) -> Result<StoreInfo, StoreError> {
        let db: Database = self
            .send(self.request(Method::GET, &format!("databases/{}", self.database_id)))
            .await?;
        Ok(StoreInfo {
            id: db.id,
            title: db
                .title
                .first()
                .map(|t| t.plain_text.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".into()),
            properties: db.properties.keys().cloned().collect(),
        })
    }
}

// ---- wire types ----

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Deserialize)]
struct Database {
    id: String,
    #[serde(default)]
    title: Vec<RichText>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct FileUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FileObject {
    External { external: FileUrl },
    File { file: FileUrl },
}

// ---- mapping ----

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::Internal(anyhow::Error::new(e).context("notion request"))
    }
}

fn classify_api_error(status: u16, body: ApiError) -> StoreError {
    let message = if body.message.is_empty() {
        format!("notion responded with status {status}")
    } else {
        body.message
    };
    match (status, body.code.as_str()) {
        (_, "unauthorized" | "restricted_resource") | (401 | 403, _) => {
            StoreError::Unauthorized(message)
        }
        (_, "object_not_found") | (404, _) => StoreError::NotFound(message),
        (_, "gateway_timeout") | (504, _) => StoreError::Timeout(message),
        (_, "service_unavailable") | (503, _) => StoreError::Unavailable(message),
        _ => StoreError::Upstream { status, message },
    }
}

fn page_to_meal(page: Page) -> Meal {
    let props = &page.properties;
    let name = props
        .get(PROP_NAME)
        .and_then(|p| p.get("title"))
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("plain_text"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNNAMED_MEAL)
        .to_string();

    // an external link is stored verbatim; hosted files carry a generated url
    let image = props
        .get(PROP_IMAGE)
        .and_then(|p| p.get("files"))
        .and_then(|f| f.get(0))
        .and_then(|f| serde_json::from_value::<FileObject>(f.clone()).ok())
        .map(|f| match f {
            FileObject::External { external } => external.url,
            FileObject::File { file } => file.url,
        });

    Meal {
        id: page.id,
        name,
        protein: multi_select_names(props, PROP_PROTEIN),
        veg_fruit: multi_select_names(props, PROP_VEG_FRUIT),
        carb: multi_select_names(props, PROP_CARB),
        other_ingredients: multi_select_names(props, PROP_OTHER),
        image,
    }
}

fn multi_select_names(props: &Map<String, Value>, key: &str) -> Vec<String> {
    props
        .get(key)
        .and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn title_value(name: &str) -> Value {
    json!({ "title": [ { "text": { "content": name } } ] })
}

fn multi_select_value(items: &[String]) -> Value {
    let options: Vec<Value> = items.iter().map(|i| json!({ "name": i })).collect();
    json!({ "multi_select": options })
}

fn files_value(url: Option<&str>) -> Value {
    match url {
        Some(url) => json!({
            "files": [ { "type": "external", "name": "meal-image", "external": { "url": url } } ]
        }),
        None => json!({ "files": [] }),
    }
}

fn create_properties(meal: &NewMeal) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(PROP_NAME.into(), title_value(&meal.name));
    for (key, items) in [
        (PROP_PROTEIN, &meal.protein),
        (PROP_VEG_FRUIT, &meal.veg_fruit),
        (PROP_OTHER, &meal.other_ingredients),
        (PROP_CARB, &meal.carb),
    ] {
        if !items.is_empty() {
            props.insert(key.into(), multi_select_value(items));
        }
    }
    if let Some(url) = meal.image.as_deref().filter(|u| !u.is_empty()) {
        props.insert(PROP_IMAGE.into(), files_value(Some(url)));
    }
    props
}

fn patch_properties(patch: &MealPatch) -> Map<String, Value> {
    let mut props = Map::new();
    if let Some(name) = &patch.name {
        props.insert(PROP_NAME.into(), title_value(name));
    }
    for (key, items) in [
        (PROP_PROTEIN, &patch.protein),
        (PROP_VEG_FRUIT, &patch.veg_fruit),
        (PROP_OTHER, &patch.other_ingredients),
        (PROP_CARB, &patch.carb),
    ] {
        if let Some(items) = items {
            props.insert(key.into(), multi_select_value(items));
        }
    }
    match &patch.image {
        ImageChange::Keep => {}
        ImageChange::Clear => {
            props.insert(PROP_IMAGE.into(), files_value(None));
        }
        ImageChange::Set(url) => {
            props.insert(PROP_IMAGE.into(), files_value(Some(url)));
        }
    }
    props
}
