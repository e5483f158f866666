use chrono::{Local, NaiveDateTime};
use log::{error, info};

use super::decision::{Decision, DecisionEngine};
use super::history::Ledger;
use crate::api::notifier::{Delivery, Notifier};
use crate::api::sampler::Sampler;
use crate::error::MonitorError;

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub decision: Decision,
    pub delivery: Option<Delivery>,
}

/// Runs one monitoring cycle against injected collaborators.
#[derive(Debug, Clone, Default)]
pub struct MonitorRunner {
    engine: DecisionEngine,
}

impl MonitorRunner {
    pub fn new(engine: DecisionEngine) -> Self {
        Self { engine }
    }

    pub async fn run_cycle(
        &self,
        sampler: &dyn Sampler,
        store: &Ledger,
        notifier: &dyn Notifier,
        destination: &str,
    ) -> Result<CycleReport, MonitorError> {
        self.run_cycle_at(sampler, store, notifier, destination, Local::now().naive_local())
            .await
    }

    /// The ledger is written before the notification goes out, so a failed
    /// send still leaves the new entry in place.
    pub async fn run_cycle_at(
        &self,
        sampler: &dyn Sampler,
        store: &Ledger,
        notifier: &dyn Notifier,
        destination: &str,
        now: NaiveDateTime,
    ) -> Result<CycleReport, MonitorError> {
        let last_entry = store.read_last().await?;
        let sample = sampler.current_price().await?;
        info!("Current price: {}", sample);

        let decision = self.engine.decide(&last_entry, &sample, now)?;

        if let Some(entry) = &decision.new_entry {
            store.append(entry).await?;
        }

        info!("{}", decision.message);

        let delivery = if decision.notify {
            match notifier.send(&decision.message, destination).await {
                Ok(delivery) => {
                    info!(
                        "{} Message sent. Status was {}",
                        delivery.message_id, delivery.status_code
                    );
                    Some(delivery)
                }
                Err(e) => {
                    error!("Notification to {} failed: {}", destination, e);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(CycleReport { decision, delivery })
    }
}
