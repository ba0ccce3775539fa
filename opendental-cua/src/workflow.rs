use crate::prompts::{
    AGENT_GUIDELINES, APPOINTMENTS_SCHEMA, PATIENTS_SCHEMA, PATIENT_CHART_SCHEMA,
    PATIENT_REPORT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

fn default_capture() -> bool {
    true
}

/// One natural-language instruction dispatched to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub label: String,
    pub instructions: String,
    /// When false the step still runs and logs, but contributes no screenshot
    #[serde(default = "default_capture")]
    pub capture_screenshot: bool,
}

impl StepDefinition {
    pub fn new(label: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: instructions.into(),
            capture_screenshot: true,
        }
    }

    pub fn without_capture(mut self) -> Self {
        self.capture_screenshot = false;
        self
    }
}

/// An ordered list of steps plus the prompt used to extract records from
/// the screenshots they capture.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub system_instructions: String,
    pub steps: Vec<StepDefinition>,
    pub schema_prompt: String,
    /// Top-level array in the extracted record counted in the final log line
    pub summary_key: Option<String>,
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.into(),
            system_instructions: String::new(),
            steps: Vec::new(),
            schema_prompt: String::new(),
            summary_key: None,
        }
    }

    /// Log line describing what extraction produced.
    pub fn summarize(&self, data: &Value) -> String {
        match &self.summary_key {
            Some(key) => {
                let count = data.get(key).and_then(Value::as_array).map_or(0, Vec::len);
                format!("Extracted {count} {key}")
            }
            None => format!("Extracted {} data", self.name.replace('_', " ")),
        }
    }

    /// Select Patient dialog, scrolled so both halves of the table are seen.
    pub fn patients() -> Self {
        Workflow::builder("patients")
            .system_instructions(format!(
                "You are automating Open Dental to navigate and capture patient data.\n\n{AGENT_GUIDELINES}"
            ))
            .step(
                "Task 1: Open Select Patient Dialog",
                "Look at the current desktop. Open Open Dental if not already open, then:
1. Wait for the application to fully load
2. Click the \"Select Patient\" button on the top toolbar
3. When the Select Patient dialog opens, wait for it to fully load
4. Take a screenshot of the Select Patient dialog",
            )
            .step(
                "Task 2: Scroll Right",
                "Continue from the current state:
1. In the Select Patient dialog, click on the bottom horizontal scrollbar",
            )
            .step_without_capture(
                "Task 3: Close Dialog",
                "Continue from the current state:
1. Close the Select Patient dialog by clicking the X button or pressing Escape
2. Wait for the dialog to close and return to the main Open Dental window",
            )
            .schema_prompt(PATIENTS_SCHEMA)
            .summary_key("patients")
            .build()
    }

    pub fn appointments() -> Self {
        Workflow::builder("appointments")
            .system_instructions(format!(
                "You are automating Open Dental to extract appointment data.\n\n{AGENT_GUIDELINES}"
            ))
            .step(
                "Task 1: Open Appointment Schedule",
                "Look at the current screen. If Open Dental is not open, press the Windows key, search for \"Open Dental\" and open it. Then:
1. Click on \"Appointments\" in the main navigation, or look for the schedule view
2. Make sure you're viewing today's date
3. Wait for the schedule to fully load
4. Take a clear screenshot showing patient names, times and procedures",
            )
            .schema_prompt(APPOINTMENTS_SCHEMA)
            .summary_key("appointments")
            .build()
    }

    /// Family, Account, Tx Plan and Appts tabs for one patient.
    pub fn patient_report(patient_name: &str) -> Self {
        Workflow::builder("patient_report")
            .system_instructions(patient_instructions(
                "extract detailed patient report data",
                patient_name,
            ))
            .step(
                "Task 1: Select Patient & Family Tab",
                format!(
                    "{}
8. In the left navigation panel, click on \"Family\"
9. Wait for the Family tab to fully load
10. Take a screenshot of the Family tab showing patient info, family members, and insurance",
                    select_patient(patient_name)
                ),
            )
            .step(
                "Task 2: Account Tab",
                tab_step(
                    "Account",
                    "the Patient Account transactions, balances, and claims",
                ),
            )
            .step(
                "Task 3: Tx Plan Tab",
                tab_step(
                    "Tx Plan",
                    "the treatment plans, procedures, fees, and insurance estimates",
                ),
            )
            .step(
                "Task 4: Appts Tab",
                tab_step(
                    "Appts",
                    "the patient's appointments history and scheduled appointments",
                ),
            )
            .schema_prompt(PATIENT_REPORT_SCHEMA)
            .build()
    }

    pub fn patient_chart(patient_name: &str) -> Self {
        Workflow::builder("patient_chart")
            .system_instructions(patient_instructions(
                "extract patient chart data",
                patient_name,
            ))
            .step(
                "Task 1: Select Patient & Chart Tab",
                format!(
                    "{}
8. In the left navigation panel, click on \"Chart\"
9. Wait for the tooth chart and procedures list to fully load
10. Take a screenshot of the Chart tab showing the tooth chart, procedures and patient info",
                    select_patient(patient_name)
                ),
            )
            .schema_prompt(PATIENT_CHART_SCHEMA)
            .build()
    }
}

fn patient_instructions(goal: &str, patient_name: &str) -> String {
    format!(
        "You are automating Open Dental to {goal}.\n\nPATIENT TO FIND: \"{patient_name}\"\n\n{AGENT_GUIDELINES}"
    )
}

fn select_patient(patient_name: &str) -> String {
    format!(
        "Look at the current desktop. Open Open Dental if not already open, then:
1. Wait for the application to fully load
2. Click the \"Select Patient\" button on the top toolbar
3. When the Select Patient dialog opens, wait for it to fully load
4. In the search field, type \"{patient_name}\" to search for the patient
5. Wait for search results to appear
6. Double-click on the patient row to select them
7. Wait for the patient record to load and the dialog to close"
    )
}

fn tab_step(tab: &str, contents: &str) -> String {
    format!(
        "Continue from the current state:
1. In the left navigation panel, click on \"{tab}\"
2. Wait for the {tab} tab to fully load
3. Take a screenshot showing {contents}"
    )
}

pub struct WorkflowBuilder {
    name: String,
    system_instructions: String,
    steps: Vec<StepDefinition>,
    schema_prompt: String,
    summary_key: Option<String>,
}

impl WorkflowBuilder {
    pub fn system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    pub fn step(mut self, label: impl Into<String>, instructions: impl Into<String>) -> Self {
        self.steps.push(StepDefinition::new(label, instructions));
        self
    }

    pub fn step_without_capture(
        mut self,
        label: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        self.steps
            .push(StepDefinition::new(label, instructions).without_capture());
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = StepDefinition>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn schema_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.schema_prompt = prompt.into();
        self
    }

    pub fn summary_key(mut self, key: impl Into<String>) -> Self {
        self.summary_key = Some(key.into());
        self
    }

    pub fn build(self) -> Workflow {
        Workflow {
            name: self.name,
            system_instructions: self.system_instructions,
            steps: self.steps,
            schema_prompt: self.schema_prompt,
            summary_key: self.summary_key,
        }
    }
}

/// The built-in workflows, keyed by their endpoint name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Patients,
    Appointments,
    PatientChart,
    Reports,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Patients => "patients",
            WorkflowKind::Appointments => "appointments",
            WorkflowKind::PatientChart => "patient_chart",
            WorkflowKind::Reports => "reports",
        }
    }

    pub fn requires_patient(&self) -> bool {
        matches!(self, WorkflowKind::PatientChart | WorkflowKind::Reports)
    }

    /// Returns `None` when the workflow needs a patient name and none was given.
    pub fn workflow(&self, patient_name: Option<&str>) -> Option<Workflow> {
        let patient = patient_name.map(str::trim).filter(|name| !name.is_empty());
        match self {
            WorkflowKind::Patients => Some(Workflow::patients()),
            WorkflowKind::Appointments => Some(Workflow::appointments()),
            WorkflowKind::PatientChart => patient.map(Workflow::patient_chart),
            WorkflowKind::Reports => patient.map(Workflow::patient_report),
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('/').trim_start_matches("api/") {
            "patients" => Ok(WorkflowKind::Patients),
            "appointments" => Ok(WorkflowKind::Appointments),
            "patient_chart" => Ok(WorkflowKind::PatientChart),
            "reports" => Ok(WorkflowKind::Reports),
            other => Err(format!("Unknown endpoint: {other}")),
        }
    }
}
