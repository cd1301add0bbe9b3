//! Shared fixtures: test configuration and a scripted chat client

use async_trait::async_trait;
use crawl_agent::config::Config;
use crawl_agent::gateway::{ChatClient, GatewayError};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Marker present in every page-analysis prompt
const ANALYSIS_MARKER: &str = "=== PAGE_LINKS ===";

/// Configuration with all state under `dir` and fast network settings
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();

    config.network.user_agent = "crawl-agent-test/0.1".to_string();
    config.network.request_interval_ms = 100;
    config.network.fetch_timeout_secs = 5;
    config.network.download_timeout_secs = 5;
    config.network.max_retries = 1;
    config.network.retry_backoff_ms = 10;

    config.storage.index_path = dir.join("index.json");
    config.storage.history_path = dir.join("crawl_history.json");
    config.storage.datasets_dir = dir.join("datasets");

    config.crawler.default_max_depth = 2;
    config.crawler.same_domain_only = true;

    config
}

/// An analysis reply with no resources and the given follow links
pub fn follow_only(links: &[String]) -> Value {
    json!({"resources": [], "follow_links": links})
}

struct Route {
    marker: String,
    replies: Vec<String>,
    served: usize,
}

#[derive(Default)]
struct Script {
    intent: String,
    routes: Vec<Route>,
    analysis_prompts: Vec<String>,
}

/// Chat client that answers by prompt content
///
/// Instructions get the intent reply. Page-analysis prompts are routed to the
/// first route whose marker text appears in the prompt; a route replays its
/// replies in order and then repeats the last one. Unrouted pages get an
/// empty analysis.
#[derive(Clone, Default)]
pub struct ScriptedChat {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChat {
    pub fn new(intent: Value) -> Self {
        let chat = Self::default();
        chat.script.lock().unwrap().intent = intent.to_string();
        chat
    }

    /// Adds a JSON reply route for pages containing `marker`
    pub fn route(self, marker: &str, reply: Value) -> Self {
        self.route_raw(marker, vec![reply.to_string()])
    }

    /// Adds a route with raw reply texts served in order
    pub fn route_raw(self, marker: &str, replies: Vec<String>) -> Self {
        self.script.lock().unwrap().routes.push(Route {
            marker: marker.to_string(),
            replies,
            served: 0,
        });
        self
    }

    /// Every page-analysis prompt received so far
    pub fn analysis_prompts(&self) -> Vec<String> {
        self.script.lock().unwrap().analysis_prompts.clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, _system: &str, user: &str) -> Result<String, GatewayError> {
        let mut script = self.script.lock().unwrap();

        if !user.contains(ANALYSIS_MARKER) {
            return Ok(script.intent.clone());
        }

        script.analysis_prompts.push(user.to_string());

        let route = script
            .routes
            .iter_mut()
            .find(|r| user.contains(r.marker.as_str()));

        match route {
            Some(route) => {
                let i = route.served.min(route.replies.len().saturating_sub(1));
                route.served += 1;
                Ok(route.replies.get(i).cloned().unwrap_or_default())
            }
            None => Ok(follow_only(&[]).to_string()),
        }
    }
}
