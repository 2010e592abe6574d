//! matchcore server entry point.

use std::sync::Arc;

use matchcore::auth::AuthService;
use matchcore::collaborators::llm::HttpLlmCollaborator;
use matchcore::collaborators::notifier::HttpNotifier;
use matchcore::collaborators::payment::HmacPaymentProvider;
use matchcore::collaborators::profile::HttpProfileStore;
use matchcore::collaborators::search::HttpSemanticSearch;
use matchcore::messaging::MessagingService;
use matchcore::quota::{PaymentService, QuotaService};
use matchcore::swipes::SwipeService;
use matchcore::{observability, Config, Database, Scheduler};

use matchcore::agent::classifier::LlmIntentClassifier;
use matchcore::agent::Dispatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    observability::init(observability::ObservabilityConfig {
        otlp_endpoint: config.otlp_endpoint.clone(),
        service_name: config.service_name.clone(),
    })?;

    let database = Database::connect(&config.database_url, config.database_max_connections).await?;
    database.initialize().await?;
    let pool = database.pool().clone();

    let notifier: Arc<dyn matchcore::collaborators::Notifier> =
        Arc::new(HttpNotifier::from_env(config.notifier_deadline).map_err(|e| format!("notifier config: {e}"))?);
    let search: Arc<dyn matchcore::collaborators::SemanticSearch> = Arc::new(
        HttpSemanticSearch::from_env(config.vector_db_deadline).map_err(|e| format!("search config: {e}"))?,
    );
    let profiles: Arc<dyn matchcore::collaborators::ProfileStore> =
        Arc::new(HttpProfileStore::from_env(config.db_deadline).map_err(|e| format!("profile store config: {e}"))?);
    let llm: Arc<dyn matchcore::collaborators::LlmCollaborator> =
        Arc::new(HttpLlmCollaborator::from_env(config.llm_deadline).map_err(|e| format!("llm config: {e}"))?);

    let payment_secret = std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_else(|_| config.jwt_secret.clone());
    let payment_provider: Arc<dyn matchcore::collaborators::PaymentProvider> =
        Arc::new(HmacPaymentProvider::new("wechat", payment_secret));

    let auth = Arc::new(AuthService::new(pool.clone(), config.clone(), notifier.clone()));
    let quota = Arc::new(QuotaService::new(pool.clone()));
    let swipes = Arc::new(SwipeService::new(pool.clone(), QuotaService::new(pool.clone())));
    let messaging = Arc::new(MessagingService::new(pool.clone()));
    let payments = Arc::new(PaymentService::new(pool.clone(), config.payment_order_ttl));

    let classifier = Arc::new(LlmIntentClassifier::new(llm.clone(), config.llm_deadline));
    let dispatcher = Arc::new(Dispatcher::new(classifier, search, profiles, llm));

    let state = matchcore::server::state::AppState {
        pool: pool.clone(),
        config: config.clone(),
        auth,
        quota,
        swipes,
        messaging,
        payments,
        dispatcher,
        payment_provider,
    };

    let scheduler = Scheduler::new(pool.clone(), config.clone()).await?;
    scheduler.start().await?;

    matchcore::server::run(state, &config.http_host, config.http_port).await?;

    Ok(())
}
