use std::sync::Arc;

use common::{
    create_template_engine,
    utils::{config::AppConfig, template_engine::TemplateEngine},
};
use retrieval_pipeline::{IndexAccessor, LlmClient};
use tracing::debug;

#[derive(Clone)]
pub struct HtmlState {
    pub templates: Arc<TemplateEngine>,
    pub llm: Arc<LlmClient>,
    pub accessor: Arc<IndexAccessor>,
    pub config: AppConfig,
}

impl HtmlState {
    pub fn new(llm: Arc<LlmClient>, accessor: Arc<IndexAccessor>, config: AppConfig) -> Self {
        let templates = Arc::new(create_template_engine!("templates"));
        debug!("template engine configured for html_router");

        Self {
            templates,
            llm,
            accessor,
            config,
        }
    }
}
