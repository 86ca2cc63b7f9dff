//! Shared test utilities for rcm integration tests.
//!
//! Provides [`ScriptedGenerator`], a [`StructuredGenerator`] that replays
//! queued responses per prompt key, plus canned fixtures for a full
//! pipeline run on the `PMP-001` reference pump.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use rcm_core::equipment::{EquipmentDescriptor, ReferenceMaterial};
use rcm_core::generation::{GenerationError, GenerationRequest, PromptKey, StructuredGenerator};

/// Every prompt key, in pipeline order.
pub const ALL_KEYS: [PromptKey; 5] = [
    PromptKey::IdentifyFunctions,
    PromptKey::FailureModes,
    PromptKey::ConsequenceAssessment,
    PromptKey::SuggestTasks,
    PromptKey::MaintenancePlan,
];

/// A request as seen by the scripted generator.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub key: PromptKey,
    pub prompt: String,
    pub had_image: bool,
    /// Names of the tools offered with the request.
    pub tools: Vec<String>,
    /// Outputs of the tools the generator invoked before answering.
    pub tool_outputs: Vec<Value>,
}

#[derive(Debug, Clone)]
enum Step {
    Respond(Value),
    Fail(String),
    CallTool { name: String, input: Value },
}

/// Replays scripted steps per [`PromptKey`].
///
/// Each call pops steps for its key: any `CallTool` steps are executed
/// through the request's tool registry, then the first response or failure
/// ends the call. A key with nothing queued fails with
/// [`GenerationError::Model`].
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    steps: Mutex<HashMap<PromptKey, VecDeque<Step>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, key: PromptKey, step: Step) -> Self {
        self.steps
            .get_mut()
            .expect("steps lock poisoned")
            .entry(key)
            .or_default()
            .push_back(step);
        self
    }

    /// Queue a successful response for `key`.
    pub fn respond(self, key: PromptKey, value: Value) -> Self {
        self.push(key, Step::Respond(value))
    }

    /// Queue a generation failure for `key`.
    pub fn fail(self, key: PromptKey, message: &str) -> Self {
        self.push(key, Step::Fail(message.to_string()))
    }

    /// Invoke tool `name` with `input` during the next call for `key`.
    pub fn call_tool(self, key: PromptKey, name: &str, input: Value) -> Self {
        self.push(
            key,
            Step::CallTool {
                name: name.to_string(),
                input,
            },
        )
    }

    /// Queue one successful response for every stage.
    pub fn with_pipeline_responses(self) -> Self {
        self.respond(PromptKey::IdentifyFunctions, functions_response())
            .respond(PromptKey::FailureModes, failure_modes_response())
            .respond(PromptKey::ConsequenceAssessment, assessment_response())
            .respond(PromptKey::SuggestTasks, tasks_response())
            .respond(PromptKey::MaintenancePlan, plan_response())
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// Requests received for `key`.
    pub fn requests_for(&self, key: PromptKey) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.key == key)
            .collect()
    }

    fn next_step(&self, key: PromptKey) -> Option<Step> {
        self.steps
            .lock()
            .expect("steps lock poisoned")
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl StructuredGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value, GenerationError> {
        let mut tool_outputs = Vec::new();

        let outcome = loop {
            match self.next_step(request.key) {
                Some(Step::CallTool { name, input }) => {
                    let tools = request
                        .tools
                        .ok_or_else(|| GenerationError::UnknownTool(name.clone()))?;
                    tool_outputs.push(tools.invoke(&name, input).await?);
                }
                Some(Step::Respond(value)) => break Ok(value),
                Some(Step::Fail(message)) => break Err(GenerationError::Model(message)),
                None => {
                    break Err(GenerationError::Model(format!(
                        "no scripted response for {}",
                        request.key
                    )));
                }
            }
        };

        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(RecordedRequest {
                key: request.key,
                prompt: request.prompt.clone(),
                had_image: request.image.is_some(),
                tools: request
                    .tools
                    .map(|t| t.names().into_iter().map(String::from).collect())
                    .unwrap_or_default(),
                tool_outputs,
            });

        outcome
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const PUMP_TAG: &str = "PMP-001";
pub const PUMP_DESCRIPTION: &str =
    "50hp centrifugal pump for cooling water circulation in the furnace loop";

/// The reference pump, without reference material.
pub fn pump_descriptor() -> EquipmentDescriptor {
    EquipmentDescriptor::new(PUMP_TAG, PUMP_DESCRIPTION, None).expect("valid fixture")
}

/// The reference pump with operator-supplied reference material.
pub fn pump_descriptor_with(reference: &str) -> EquipmentDescriptor {
    EquipmentDescriptor::new(PUMP_TAG, PUMP_DESCRIPTION, ReferenceMaterial::parse(reference))
        .expect("valid fixture")
}

pub fn functions_response() -> Value {
    json!({
        "functions": [
            "Circulate cooling water at 120 m3/h",
            "Maintain discharge pressure at 4 bar",
            "Contain the process fluid without leaks"
        ]
    })
}

pub fn failure_modes_response() -> Value {
    json!({
        "failureModes": [
            "Impeller wear reduces flow",
            "Mechanical seal leak",
            "Bearing seizure from lubrication loss"
        ]
    })
}

pub fn assessment_response() -> Value {
    json!({
        "assessment": "## Mechanical seal leak\n- **Safety:** slip hazard\n- **Environment:** contaminated water\n- **Production:** furnace trip\n- **Cost:** $450 seal plus downtime"
    })
}

pub fn tasks_response() -> Value {
    json!({
        "maintenanceTasks": [
            {
                "task": "Vibration inspection",
                "type": "Predictive",
                "frequency": "Every 500 operating hours",
                "explanation": "Detects bearing and impeller degradation early."
            },
            {
                "task": "Lubricate bearings with Polyrex EM",
                "type": "Preventive",
                "frequency": "Every 2000 operating hours",
                "explanation": "Prevents bearing seizure."
            }
        ]
    })
}

pub fn plan_response() -> Value {
    json!({
        "maintenancePlan": "## Preventive Maintenance Tasks\n- Lubricate bearings every 2000 h.\n\n## Predictive Maintenance Tasks\n- Vibration inspection every 500 h (limit 4.5 mm/s RMS).\n\n## Recommended Procedures\n1. Isolate the pump.\n2. Measure vibration."
    })
}
