use std::sync::Arc;

use crate::domain::model::AppConfig;
use crate::ports::{browser::Browser, clock::Clock, random::RandomSource, store::PostStore};

/// Everything a run needs, shared by `Arc`. The store is usually a `dyn PostStore`
/// picked from config at startup.
pub struct AppContext<S, B, C, G>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    pub cfg: Arc<AppConfig>,
    pub store: Arc<S>,
    pub browser: Arc<B>,
    pub clock: Arc<C>,
    pub rng: Arc<G>,
}

impl<S, B, C, G> AppContext<S, B, C, G>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    pub fn new(cfg: AppConfig, store: Arc<S>, browser: B, clock: C, rng: G) -> Self {
        Self {
            cfg: Arc::new(cfg),
            store,
            browser: Arc::new(browser),
            clock: Arc::new(clock),
            rng: Arc::new(rng),
        }
    }
}

impl<S, B, C, G> Clone for AppContext<S, B, C, G>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    fn clone(&self) -> Self {
        Self {
            cfg: Arc::clone(&self.cfg),
            store: Arc::clone(&self.store),
            browser: Arc::clone(&self.browser),
            clock: Arc::clone(&self.clock),
            rng: Arc::clone(&self.rng),
        }
    }
}
