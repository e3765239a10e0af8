use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::{CollectRequest, Collector};

/// How often the scheduled collector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectFrequency {
    Diaria,
    Semanal,
    Mensal,
}

impl CollectFrequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "diaria" | "diária" | "daily" => Some(Self::Diaria),
            "semanal" | "weekly" => Some(Self::Semanal),
            "mensal" | "monthly" => Some(Self::Mensal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diaria => "diaria",
            Self::Semanal => "semanal",
            Self::Mensal => "mensal",
        }
    }

    /// Six-field cron (seconds first); every variant fires at 06:00 UTC.
    pub fn cron_expression(self) -> &'static str {
        match self {
            Self::Diaria => "0 0 6 * * *",
            Self::Semanal => "0 0 6 * * Mon",
            Self::Mensal => "0 0 6 1 * *",
        }
    }

    pub fn next_run_after(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Diaria => from + Duration::days(1),
            Self::Semanal => from + Duration::weeks(1),
            Self::Mensal => from + Duration::days(30),
        }
    }
}

impl fmt::Display for CollectFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registers one recurring collection job. The caller starts the scheduler.
pub async fn build_scheduler(
    collector: Arc<Collector>,
    request: CollectRequest,
    frequency: CollectFrequency,
) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = frequency.cron_expression();
    let job = Job::new_async(cron, move |_uuid, _l| {
        let collector = collector.clone();
        let request = request.clone();
        Box::pin(async move {
            match collector.run_once(&request).await {
                Ok(run) => info!(
                    run_id = %run.summary.run_id,
                    new_records = run.summary.new_records,
                    next_run = %frequency.next_run_after(Utc::now()),
                    "scheduled collection finished"
                ),
                Err(err) => error!(error = %format!("{err:#}"), "scheduled collection failed"),
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(sched)
}
