//! Bot startup: authorize, wire the controller to Telegram and Google, then
//! poll until interrupted.

use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    intake_config::{IntakeConfig, Severity, validate},
    intake_core::{ControllerSettings, FlushSchedule, IntakeController, spawn_flush_loop},
    intake_google::{DriveClient, GoogleApi, SheetsLedger},
    intake_telegram::{PollingOptions, TelegramTransport, connect, run_polling},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use crate::auth_commands::{open_authorization_url, token_manager};

const RUNNING_BANNER: &str = "🚀 UCClaimControl Bulk Upload Bot running... Press Ctrl+C to stop.";

pub async fn run(config: IntakeConfig) -> Result<()> {
    let checks = validate(&config);
    for d in &checks.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
        }
    }
    if checks.has_errors() {
        bail!(
            "configuration has {} error(s); run `intake config check`",
            checks.count(Severity::Error)
        );
    }

    let tokens = Arc::new(token_manager(&config)?);
    tokens
        .ensure_authorized(open_authorization_url)
        .await
        .context("Google authorization failed")?;

    let api = GoogleApi::new(tokens);
    let drive = Arc::new(DriveClient::new(api.clone(), &config.google.drive_api_url)?);
    let ledger = Arc::new(
        SheetsLedger::new(
            api,
            &config.google.sheets_api_url,
            config.sheets.spreadsheet_id.clone(),
            config.sheets.range.clone(),
        )?
        .with_value_input_option(config.sheets.value_input_option.clone()),
    );

    let bot = connect(&config.telegram.token, config.telegram.api_url.as_deref())?;
    let transport = Arc::new(TelegramTransport::new(bot.clone()));

    let controller = Arc::new(IntakeController::new(
        ControllerSettings {
            parent_folder_id: config.drive.parent_folder_id.clone(),
            quiet_period: config.intake.quiet_period(),
        },
        transport,
        drive,
        ledger,
    ));

    let cancel = CancellationToken::new();
    let flusher = spawn_flush_loop(
        Arc::clone(&controller),
        FlushSchedule {
            first_delay: config.intake.first_flush_delay(),
            interval: config.intake.flush_interval(),
        },
        cancel.clone(),
    );
    let mut polling = tokio::spawn(run_polling(
        bot,
        controller,
        PollingOptions::default(),
        cancel.clone(),
    ));

    println!("{RUNNING_BANNER}");

    let mut polling_done = false;
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            signal.context("listening for Ctrl+C")
        }
        joined = &mut polling => {
            polling_done = true;
            match joined {
                Ok(result) => result.context("telegram polling failed"),
                Err(e) => Err(e).context("telegram polling task panicked"),
            }
        }
    };

    cancel.cancel();
    if !polling_done && let Err(e) = polling.await {
        warn!(error = %e, "telegram polling task did not shut down cleanly");
    }
    if let Err(e) = flusher.await {
        warn!(error = %e, "flush loop did not shut down cleanly");
    }
    info!("intake stopped");
    outcome
}
