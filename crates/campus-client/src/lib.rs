// High-level client for a campus administration backend.
//
// Layered bottom-up:
// - `config`: client defaults plus env/YAML layering.
// - `gateway`: the single outbound-request path. Bearer attachment,
//   response classification, and the global 401 teardown live here and
//   nowhere else.
// - `endpoints`: typed endpoint groups over the gateway.
// - `cache`: request-keyed read cache with stale-while-revalidate and
//   per-key in-flight coalescing.
// - `bootstrap`: the login-to-ready state machine, including the config
//   fetch that gates the dashboard and its rollback rules.
//
// Persistence is injected: the gateway and bootstrap operate on
// `campus_store` stores handed in at construction, so tests run against
// in-memory backends and deployments pick file-backed ones.
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod endpoints;
pub mod gateway;

pub use bootstrap::{LoginFailure, LoginFlow, LoginState, LoginSubmission};
pub use cache::{KeyPart, QueryCache, QueryKey, QueryOptions, QueryResult};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use endpoints::Api;
pub use gateway::{ApiClient, UnauthorizedHook};
