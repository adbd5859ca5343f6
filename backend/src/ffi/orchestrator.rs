//! PyO3 wrapper for Orchestrator

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{
    epoch_record_to_py, parse_network_spec, parse_orchestrator_config, run_report_to_py,
};
use crate::orchestrator::Orchestrator as RustOrchestrator;

/// Python wrapper for the Rust orchestrator
///
/// # Example (from Python)
///
/// ```python
/// import json
/// from repair_planner_core_rs import Orchestrator
///
/// network = {
///     "nodes": [
///         {"id": "SUB-1", "importance": 0, "population_served": 0,
///          "repair_time": 0, "initial_state": "Operational", "is_source": True},
///         {"id": "EPN-1", "importance": 5, "population_served": 300, "repair_time": 30},
///     ],
///     "edges": [["SUB-1", "EPN-1"]],
/// }
/// orch = Orchestrator(json.dumps({"total_crews": 3}), json.dumps(network))
/// report = orch.run()
/// print(report["status"], report["final_service_metric"])
/// ```
#[pyclass(name = "Orchestrator")]
pub struct PyOrchestrator {
    inner: RustOrchestrator,
}

fn runtime_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyRuntimeError::new_err(format!("{}: {}", context, err))
}

#[pymethods]
impl PyOrchestrator {
    /// Create an orchestrator from JSON configuration and network
    ///
    /// Raises ValueError for malformed JSON and RuntimeError for invalid
    /// parameters or topology.
    #[new]
    fn new(config_json: &str, network_json: &str) -> PyResult<Self> {
        let config = parse_orchestrator_config(config_json)?;
        let spec = parse_network_spec(network_json)?;
        let inner = RustOrchestrator::new(config, spec)
            .map_err(|e| runtime_error("Failed to create orchestrator", e))?;
        Ok(PyOrchestrator { inner })
    }

    /// Resume from a snapshot produced by `save_state`
    #[staticmethod]
    fn load_state(config_json: &str, network_json: &str, snapshot_json: &str) -> PyResult<Self> {
        let config = parse_orchestrator_config(config_json)?;
        let spec = parse_network_spec(network_json)?;
        let inner = RustOrchestrator::load_state(config, spec, snapshot_json)
            .map_err(|e| runtime_error("Failed to load snapshot", e))?;
        Ok(PyOrchestrator { inner })
    }

    /// Execute one epoch; returns the epoch record
    fn tick(&mut self, py: Python) -> PyResult<Py<PyDict>> {
        let record = self
            .inner
            .tick()
            .map_err(|e| runtime_error("Epoch execution failed", e))?;
        epoch_record_to_py(py, &record)
    }

    /// Run to completion or budget exhaustion; returns the run report
    fn run(&mut self, py: Python) -> PyResult<Py<PyDict>> {
        let report = self
            .inner
            .run()
            .map_err(|e| runtime_error("Run failed", e))?;
        run_report_to_py(py, &report)
    }

    fn current_epoch(&self) -> usize {
        self.inner.current_epoch()
    }

    fn service_metric(&self) -> f64 {
        self.inner.state().service_metric()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Snapshot of the resumable state as JSON
    fn save_state(&self) -> PyResult<String> {
        self.inner
            .save_state()
            .map_err(|e| runtime_error("Failed to save state", e))
    }

    /// Full event log as a JSON array
    fn event_log_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.event_log().events())
            .map_err(|e| runtime_error("Failed to serialize event log", e))
    }
}
