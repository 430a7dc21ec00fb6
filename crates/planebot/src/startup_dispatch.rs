use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use planebot_cli::{load_bot_config, load_member_directory, load_project_bindings, Cli};
use planebot_plane::{PlaneApiClient, PlaneApiConfig};
use planebot_runtime::{
    CommandRuntimeContext, ProjectReportService, ReportDispatcher, ReportSchedule,
    TaskCommandService,
};
use planebot_telegram_runtime::{
    run_telegram_bridge, TelegramApiClient, TelegramBridgeRuntimeConfig, TelegramReportDispatcher,
};

pub(crate) struct BotServices {
    pub(crate) commands: TaskCommandService,
    pub(crate) telegram: TelegramApiClient,
    pub(crate) dispatcher: Arc<dyn ReportDispatcher>,
    pub(crate) schedule: ReportSchedule,
}

/// Loads configuration files and wires the tracker, command and report services.
/// Nothing here touches the network.
pub(crate) fn build_bot_services(cli: &Cli) -> Result<BotServices> {
    let config = load_bot_config(&cli.config)?;
    let schedule = ReportSchedule::parse(
        &config.cron_expression,
        &config.timezone,
        &config.cron_start_date,
    )
    .with_context(|| format!("invalid report schedule in {}", cli.config.display()))?;
    let members = load_member_directory(&config.members_file)?;
    let bindings = load_project_bindings(&config.projects_file)?;
    tracing::info!(
        members = members.len(),
        projects = bindings.len(),
        report_states = config.report_states.len(),
        "bot configuration loaded"
    );

    let plane = PlaneApiClient::new(PlaneApiConfig {
        base_url: cli.plane_base_url.clone(),
        workspace_slug: cli.plane_workspace_slug.clone(),
        api_token: cli.plane_api_token.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })?;
    let links = plane.link_builder();
    let context = CommandRuntimeContext::new(Arc::new(plane), members, bindings, links);
    let reports = ProjectReportService::new(context.clone(), config.report_states);
    let commands = TaskCommandService::new(context, reports.clone(), cli.verbose_errors);

    let telegram = TelegramApiClient::new(
        cli.telegram_api_base.clone(),
        cli.telegram_bot_token.clone(),
        cli.request_timeout_ms,
        cli.retry_max_attempts,
        cli.retry_base_delay_ms,
    )?;
    let dispatcher: Arc<dyn ReportDispatcher> =
        Arc::new(TelegramReportDispatcher::new(telegram.clone(), reports));

    Ok(BotServices {
        commands,
        telegram,
        dispatcher,
        schedule,
    })
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let services = build_bot_services(&cli)?;
    if cli.once_report {
        let delivered = services.dispatcher.dispatch_reports().await?;
        tracing::info!(delivered, "one-shot report run complete");
        return Ok(());
    }

    tracing::info!(
        schedule = services.schedule.expression(),
        timezone = %services.schedule.timezone(),
        "starting planebot"
    );
    run_telegram_bridge(TelegramBridgeRuntimeConfig {
        client: services.telegram,
        commands: services.commands,
        bot_name: cli.telegram_bot_name.clone(),
        poll_timeout_seconds: cli.telegram_poll_timeout_seconds,
        error_backoff: Duration::from_millis(cli.poll_error_backoff_ms.max(1)),
        report_schedule: Some((services.schedule, services.dispatcher)),
    })
    .await
}
