//! Transaction orchestration shared by the command handlers and the ATG.
//!
//! StartTransaction/StopTransaction are sent through the outbound adapter;
//! connector state is only touched after the Central System's verdict, so a
//! racing remote command observes either the old or the new state, never a
//! half-applied one.

use crate::configuration::METER_VALUE_SAMPLE_INTERVAL_KEY;
use crate::error::StationError;
use crate::outbound::{RequestSender, RequestSenderExt, SendOptions};
use crate::station::StationState;
use chrono::Utc;
use evsim_messages::v16::{StartTransactionResponse, StopTransactionResponse};
use evsim_types::common::{MeterValue, Reason, ReadingContext, SampledValue};
use evsim_types::v16::ChargePointStatus;
use evsim_types::{ConnectorId, IdToken};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Build the single-sample meter value carrying the energy register.
pub fn energy_register_meter_value(register_wh: f64, context: ReadingContext) -> MeterValue {
    MeterValue {
        timestamp: Utc::now(),
        sampled_value: vec![SampledValue::energy_register(register_wh, context)],
    }
}

/// Ask the Central System to start a transaction on a connector and apply
/// its verdict to the connector state.
pub async fn start_transaction(
    state: &Arc<StationState>,
    sender: &Arc<dyn RequestSender>,
    connector_id: ConnectorId,
    id_tag: Option<IdToken>,
) -> Result<StartTransactionResponse, StationError> {
    let meter_start = {
        let connectors = state.connectors().read().await;
        let connector = connectors
            .lookup(connector_id)
            .ok_or(StationError::UnknownConnector(connector_id))?;
        connector.energy_register_wh().round() as i32
    };

    let response = sender
        .send_start_transaction(connector_id, id_tag.clone(), meter_start)
        .await?;

    if response.id_tag_info.accepted() {
        {
            let mut connectors = state.connectors().write().await;
            let connector = connectors
                .lookup_mut(connector_id)
                .ok_or(StationError::UnknownConnector(connector_id))?;
            connector.begin_transaction(connector_id, response.transaction_id, id_tag)?;
            connector.set_status(ChargePointStatus::Charging);
        }
        sender
            .send_status_notification(connector_id, ChargePointStatus::Charging, SendOptions::default())
            .await?;
        spawn_meter_sampler(state, sender, connector_id).await;
        debug!(
            station = state.id(),
            connector = connector_id,
            transaction = response.transaction_id,
            "transaction started"
        );
    } else {
        debug!(
            station = state.id(),
            connector = connector_id,
            status = ?response.id_tag_info.status,
            "start transaction refused"
        );
    }

    Ok(response)
}

/// Stop the transaction on a connector, if any.
///
/// Emits the transaction-end meter sample when the station is configured
/// for begin/end meter values under strict compliance, sends
/// StopTransaction, then resets the connector's transient state and reports
/// the post-transaction status.
pub async fn stop_transaction(
    state: &Arc<StationState>,
    sender: &Arc<dyn RequestSender>,
    connector_id: ConnectorId,
    reason: Option<Reason>,
) -> Result<Option<StopTransactionResponse>, StationError> {
    let (transaction_id, id_tag, register_wh) = {
        let connectors = state.connectors().read().await;
        let connector = connectors
            .lookup(connector_id)
            .ok_or(StationError::UnknownConnector(connector_id))?;
        if !connector.transaction_started() {
            return Ok(None);
        }
        let transaction_id = connector
            .transaction_id()
            .ok_or(StationError::UnknownConnector(connector_id))?;
        (
            transaction_id,
            connector.transaction_id_tag().cloned(),
            connector.energy_register_wh(),
        )
    };

    let info = state.info();
    if info.begin_end_meter_values
        && info.ocpp_strict_compliance
        && !info.out_of_order_end_meter_values
    {
        sender
            .send_meter_values(
                connector_id,
                Some(transaction_id),
                vec![energy_register_meter_value(
                    register_wh,
                    ReadingContext::TransactionEnd,
                )],
            )
            .await?;
    }

    let response = sender
        .send_stop_transaction(
            transaction_id,
            register_wh.round() as i32,
            id_tag,
            reason,
        )
        .await?;

    state.abort_meter_task(connector_id).await;

    let next_status = {
        let mut connectors = state.connectors().write().await;
        let connector = connectors
            .lookup_mut(connector_id)
            .ok_or(StationError::UnknownConnector(connector_id))?;
        connector.clear_transaction();
        let next = if connector.operative() {
            ChargePointStatus::Available
        } else {
            ChargePointStatus::Unavailable
        };
        connector.set_status(next);
        next
    };
    sender
        .send_status_notification(connector_id, next_status, SendOptions::default())
        .await?;
    debug!(
        station = state.id(),
        connector = connector_id,
        transaction = transaction_id,
        ?reason,
        "transaction stopped"
    );

    Ok(Some(response))
}

/// Periodic Energy.Active.Import.Register sampling while a transaction
/// runs. A disabled interval (0) spawns nothing.
async fn spawn_meter_sampler(
    state: &Arc<StationState>,
    sender: &Arc<dyn RequestSender>,
    connector_id: ConnectorId,
) {
    let interval_secs = state
        .configuration()
        .read()
        .await
        .interval_secs(METER_VALUE_SAMPLE_INTERVAL_KEY)
        .unwrap_or(0);
    if interval_secs == 0 {
        return;
    }

    let state = Arc::clone(state);
    let sender = Arc::clone(sender);
    let power_w = state.info().charge_power_w;
    let task_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        let state = task_state;
        let interval = Duration::from_secs(interval_secs);
        loop {
            tokio::time::sleep(interval).await;

            let sample = {
                let jitter = {
                    use rand::Rng;
                    rand::thread_rng().gen_range(0.9..1.1)
                };
                let delta_wh = power_w * interval_secs as f64 / 3600.0 * jitter;
                let mut connectors = state.connectors().write().await;
                match connectors.lookup_mut(connector_id) {
                    Some(connector) if connector.transaction_started() => {
                        connector.add_energy_wh(delta_wh);
                        connector
                            .transaction_id()
                            .map(|tx| (tx, connector.energy_register_wh()))
                    }
                    _ => None,
                }
            };
            let Some((transaction_id, register_wh)) = sample else {
                break;
            };

            let meter_value =
                energy_register_meter_value(register_wh, ReadingContext::SamplePeriodic);
            if let Err(err) = sender
                .send_meter_values(connector_id, Some(transaction_id), vec![meter_value])
                .await
            {
                warn!(
                    station = state.id(),
                    connector = connector_id,
                    error = %err,
                    "meter values failed"
                );
            }
        }
    });
    state.remember_meter_task(connector_id, task).await;
}
