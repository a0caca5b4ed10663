//! What an action can reach while it runs

use crate::driver::Driver;
use sheetrun_common::ProjectConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Backend, configuration and the element find wait in force for one attempt
#[derive(Clone)]
pub struct ActionContext {
    driver: Arc<dyn Driver>,
    config: Arc<ProjectConfig>,
    find_wait: Duration,
}

impl ActionContext {
    pub fn new(driver: Arc<dyn Driver>, config: Arc<ProjectConfig>) -> Self {
        let find_wait = config.timing.find_wait();
        Self {
            driver,
            config,
            find_wait,
        }
    }

    /// Same context with a different find wait, used while retrying
    pub fn with_find_wait(&self, find_wait: Duration) -> Self {
        Self {
            find_wait,
            ..self.clone()
        }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn find_wait(&self) -> Duration {
        self.find_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.config.timing.max_wait()
    }

    /// Base folder for file actions
    pub fn repo_path(&self) -> PathBuf {
        self.config.repo_path()
    }
}
