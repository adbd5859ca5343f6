//! Type conversions across the Python boundary
//!
//! Configuration and network descriptions cross as JSON strings (parsed by
//! serde on the Rust side); results come back as plain dicts.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::models::network::NetworkSpec;
use crate::orchestrator::{EpochRecord, OrchestratorConfig, RunReport, RunStatus};

/// Parse an orchestrator configuration from JSON
///
/// Missing fields take their defaults.
pub fn parse_orchestrator_config(json: &str) -> PyResult<OrchestratorConfig> {
    serde_json::from_str(json)
        .map_err(|e| PyValueError::new_err(format!("Invalid orchestrator config: {}", e)))
}

/// Parse a network description from JSON
pub fn parse_network_spec(json: &str) -> PyResult<NetworkSpec> {
    serde_json::from_str(json)
        .map_err(|e| PyValueError::new_err(format!("Invalid network description: {}", e)))
}

/// Convert an epoch record to a Python dict
pub fn epoch_record_to_py(py: Python, record: &EpochRecord) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);

    dict.set_item("epoch", record.epoch)?;
    dict.set_item("service_metric", record.service_metric)?;
    dict.set_item("unserved_population", record.unserved_population)?;
    dict.set_item("dispatched", PyList::new_bound(py, &record.dispatched))?;
    dict.set_item("repaired", PyList::new_bound(py, &record.repaired))?;
    dict.set_item("failed_attempts", PyList::new_bound(py, &record.failed_attempts))?;
    dict.set_item("newly_damaged", PyList::new_bound(py, &record.newly_damaged))?;
    dict.set_item("crews_committed", record.crews_committed)?;
    dict.set_item("crews_total", record.crews_total)?;
    dict.set_item("utilization", record.utilization)?;
    dict.set_item("cost_to_go", record.cost_to_go)?;

    let no_op = record.no_op.map(|reason| {
        serde_json::to_value(reason)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    });
    dict.set_item("no_op", no_op)?;

    Ok(dict.unbind())
}

/// Convert a run report to a Python dict
pub fn run_report_to_py(py: Python, report: &RunReport) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);

    let status = match report.status {
        RunStatus::Completed => "completed",
        RunStatus::BudgetExhausted => "budget_exhausted",
    };
    dict.set_item("status", status)?;
    dict.set_item("epochs_run", report.epochs_run)?;
    dict.set_item("final_service_metric", report.final_service_metric)?;
    dict.set_item("repair_order", PyList::new_bound(py, &report.repair_order))?;
    dict.set_item("unserved_population_epochs", report.unserved_population_epochs)?;
    dict.set_item(
        "remaining_failed",
        PyList::new_bound(py, &report.remaining_failed),
    )?;

    Ok(dict.unbind())
}
