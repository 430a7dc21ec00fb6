use anyhow::Result;
use async_trait::async_trait;
use planebot_runtime::{ProjectReportService, ReportDispatcher};

use super::telegram_api_client::TelegramApiClient;

#[derive(Clone)]
/// Public struct `TelegramReportDispatcher` sending each bound chat its project report.
pub struct TelegramReportDispatcher {
    client: TelegramApiClient,
    reports: ProjectReportService,
}

impl TelegramReportDispatcher {
    pub fn new(client: TelegramApiClient, reports: ProjectReportService) -> Self {
        Self { client, reports }
    }
}

#[async_trait]
impl ReportDispatcher for TelegramReportDispatcher {
    async fn dispatch_reports(&self) -> Result<usize> {
        let mut delivered = 0_usize;
        for report in self.reports.collect_reports().await {
            match self.client.send_message(&report.chat_id, &report.text, None).await {
                Ok(_) => {
                    delivered += 1;
                    tracing::info!(
                        project_id = %report.project_id,
                        chat_id = %report.chat_id,
                        "project report sent"
                    );
                }
                Err(error) => tracing::warn!(
                    project_id = %report.project_id,
                    chat_id = %report.chat_id,
                    error = %format!("{error:#}"),
                    "failed to send project report"
                ),
            }
        }
        Ok(delivered)
    }
}
