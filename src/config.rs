// src/config.rs

use anyhow::Context;
use chrono::Duration;
use std::{env, str::FromStr, sync::Arc};

use crate::{
    db::{MemoryStore, PgStore, Store},
    services::{auth::AuthService, catalog_service::CatalogService, ledger_service::LedgerService},
};

// Configuração lida do ambiente (.env incluído)
#[derive(Debug, Clone)]
pub struct Config {
    // Sem DATABASE_URL o servidor sobe com o backend em memória
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub db_max_connections: u32,
    pub seed_demo_data: bool,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} inválida ('{}'): {}", name, raw, e)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            jwt_secret,
            host: var_or("HOST", "0.0.0.0".to_string())?,
            port: var_or("PORT", 5000)?,
            token_ttl_hours: var_or("TOKEN_TTL_HOURS", 24)?,
            bcrypt_cost: var_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5)?,
            seed_demo_data: var_or("SEED_DEMO_DATA", false)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt_secret: "segredo-de-teste".into(),
            host: "127.0.0.1".into(),
            port: 0,
            token_ttl_hours: 24,
            bcrypt_cost: 4,
            db_max_connections: 1,
            seed_demo_data: false,
        }
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub ledger_service: LedgerService,
}

impl AppState {
    /// Abre o backend de armazenamento indicado pela configuração.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        match config.database_url.clone() {
            Some(url) => {
                let store = PgStore::connect(&url, config.db_max_connections)
                    .await
                    .context("Falha ao conectar ao banco de dados")?;
                store
                    .migrate()
                    .await
                    .context("Falha ao rodar as migrações do banco de dados")?;
                Ok(Self::with_store(config, Arc::new(store)))
            }
            None => {
                tracing::warn!("⚠️ DATABASE_URL não definida: usando armazenamento em memória (dados somem ao reiniciar)");
                Ok(Self::with_store(config, Arc::new(MemoryStore::new())))
            }
        }
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_store<S: Store + 'static>(config: Config, store: Arc<S>) -> Self {
        let auth_service = AuthService::new(
            store.clone(),
            config.jwt_secret.clone(),
            Duration::hours(config.token_ttl_hours),
            config.bcrypt_cost,
        );
        let catalog_service = CatalogService::new(store.clone());
        let ledger_service = LedgerService::new(store.clone(), catalog_service.clone());

        Self {
            config: Arc::new(config),
            store,
            auth_service,
            catalog_service,
            ledger_service,
        }
    }

    #[cfg(test)]
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }
}
