use std::{fmt, sync::Arc};

use marquee_core::HeroPoolService;

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub hero: Arc<HeroPoolService>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("hero", &self.hero)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(hero: Arc<HeroPoolService>, config: Arc<Config>) -> Self {
        Self { hero, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
