use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::cache::PageCache;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub page_cache: PageCache,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let page_cache = PageCache::new(config.page_ttl(), config.cache.max_entries);
        Self {
            db,
            config,
            page_cache,
        }
    }
}
