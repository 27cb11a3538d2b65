//! Drinks API wired up with per-route permissions, keeping drinks in memory.
//!
//! ```sh
//! AUTH0_DOMAIN=your-tenant.auth0.com API_AUDIENCE=coffee RUST_LOG=drinks_auth=debug,info \
//!     cargo run --example drinks_server
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Extension, Json, Router,
};
use drinks_auth::{AuthConfig, Authorizer, Claims};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Ingredient {
    name: String,
    color: String,
    parts: u32,
}

#[derive(Clone, Debug)]
struct Drink {
    id: u64,
    title: String,
    recipe: Vec<Ingredient>,
}

impl Drink {
    /// Public view: colors and proportions only.
    fn short(&self) -> Value {
        let recipe: Vec<Value> = self
            .recipe
            .iter()
            .map(|ingredient| json!({"color": ingredient.color, "parts": ingredient.parts}))
            .collect();
        json!({"id": self.id, "title": self.title, "recipe": recipe})
    }

    fn long(&self) -> Value {
        json!({"id": self.id, "title": self.title, "recipe": self.recipe})
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeInput {
    One(Ingredient),
    Many(Vec<Ingredient>),
}

impl From<RecipeInput> for Vec<Ingredient> {
    fn from(input: RecipeInput) -> Self {
        match input {
            RecipeInput::One(ingredient) => vec![ingredient],
            RecipeInput::Many(ingredients) => ingredients,
        }
    }
}

#[derive(Deserialize)]
struct NewDrink {
    title: String,
    recipe: RecipeInput,
}

#[derive(Deserialize)]
struct DrinkUpdate {
    title: Option<String>,
    recipe: Option<RecipeInput>,
}

#[derive(Default)]
struct Store {
    next_id: u64,
    drinks: Vec<Drink>,
}

type AppState = Arc<RwLock<Store>>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": "resource not found", "error": 404})),
    )
        .into_response()
}

async fn list_drinks(State(store): State<AppState>) -> Json<Value> {
    let store = store.read().await;
    let drinks: Vec<Value> = store.drinks.iter().map(Drink::short).collect();
    Json(json!({"success": true, "drinks": drinks}))
}

async fn drinks_detail(State(store): State<AppState>) -> Json<Value> {
    let store = store.read().await;
    let drinks: Vec<Value> = store.drinks.iter().map(Drink::long).collect();
    Json(json!({"success": true, "drinks": drinks}))
}

async fn create_drink(
    Extension(claims): Extension<Claims>,
    State(store): State<AppState>,
    Json(new_drink): Json<NewDrink>,
) -> Json<Value> {
    let mut store = store.write().await;
    store.next_id += 1;
    let drink = Drink {
        id: store.next_id,
        title: new_drink.title,
        recipe: new_drink.recipe.into(),
    };
    tracing::info!(id = drink.id, subject = claims.subject(), "drink created");
    let body = json!({"success": true, "drinks": [drink.long()]});
    store.drinks.push(drink);
    Json(body)
}

async fn update_drink(
    State(store): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<DrinkUpdate>,
) -> Response {
    let mut store = store.write().await;
    let Some(drink) = store.drinks.iter_mut().find(|drink| drink.id == id) else {
        return not_found();
    };
    if let Some(title) = update.title {
        drink.title = title;
    }
    if let Some(recipe) = update.recipe {
        drink.recipe = recipe.into();
    }
    Json(json!({"success": true, "drinks": [drink.long()]})).into_response()
}

async fn delete_drink(State(store): State<AppState>, Path(id): Path<u64>) -> Response {
    let mut store = store.write().await;
    let Some(index) = store.drinks.iter().position(|drink| drink.id == id) else {
        return not_found();
    };
    store.drinks.remove(index);
    Json(json!({"success": true, "delete": id})).into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuthConfig::from_env()?;
    tracing::info!(
        domain = %config.domain,
        audience = %config.audience,
        jwks_url = %config.jwks_url,
        "verifying tokens"
    );
    let authorizer = Authorizer::from_config(&config)?;

    let router = Router::new()
        .route(
            "/drinks",
            get(list_drinks).post(create_drink.layer(authorizer.require("post:drinks"))),
        )
        .route(
            "/drinks-detail",
            get(drinks_detail).route_layer(authorizer.require("get:drinks-detail")),
        )
        .route(
            "/drinks/{id}",
            patch(update_drink.layer(authorizer.require("patch:drinks")))
                .delete(delete_drink.layer(authorizer.require("delete:drinks"))),
        )
        .with_state(AppState::default());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
