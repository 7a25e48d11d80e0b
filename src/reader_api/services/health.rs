use poem_openapi::payload::PlainText;

use crate::app::AppContext;

pub struct HealthService<'a> {
    pub ctx: &'a AppContext,
}

impl<'a> HealthService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status_text(&self) -> PlainText<String> {
        let progress = self.ctx.orchestrator.progress().snapshot();
        let mut text = format!(
            "driveread version={} remote={} books={}",
            env!("CARGO_PKG_VERSION"),
            if self.ctx.orchestrator.has_remote() { "connected" } else { "local" },
            progress.len()
        );
        if let Some(warning) = self.ctx.orchestrator.last_warning() {
            text.push_str(&format!(" warning=\"{}\"", warning));
        }
        PlainText(text)
    }
}
