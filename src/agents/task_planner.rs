//! Task plan generation from an SRS document

use super::{default_model, ensure_room_for_output};
use crate::context::{BudgetOutcome, BudgetRequest, ContextBudgeter};
use crate::conversation::{ConversationStore, TurnKind};
use crate::error::{Error, Result};
use crate::generation::{ChatModel, GenerationRequest};
use crate::models::ModelRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_PROMPT: &str = r#"You are a task planner for software development projects. Break the attached requirements document into actionable, well-scoped tasks.

Instructions:
1. Work out the project scope, requirements and technical constraints from the document.
2. Cover every part of the implementation.
3. Assign each task to a Frontend Developer, Backend Developer or Database Engineer.
4. Keep tasks specific and measurable, neither too broad nor too narrow.
5. Give each task clear acceptance criteria.
6. List dependencies on other tasks by id where they exist.
7. Rate priority and complexity as high, medium or low.

Respond with a single JSON object and nothing else, in this shape:
{
  "project_analysis": "Brief analysis of the project",
  "tasks": [
    {
      "id": "TASK-001",
      "task_title": "Descriptive task name",
      "description": "What needs to be done and why",
      "technical_requirements": "Technical details needed to implement it",
      "acceptance_criteria": "Criteria that must be met for completion",
      "dependencies": ["TASK-000"],
      "assigned_to": "Frontend Developer|Backend Developer|Database Engineer",
      "priority": "high|medium|low",
      "complexity": "high|medium|low",
      "estimated_hours": 8,
      "status": "open"
    }
  ]
}
Use null for dependencies when a task has none."#;

/// Request for a task plan
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPlanRequest {
    /// The requirements document to plan from
    pub srs_document: String,
    /// Planning dialog to continue, if any
    #[serde(default)]
    pub session_id: Option<String>,
    /// Extra guidance from the user
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model_override: Option<ModelRecord>,
}

impl TaskPlanRequest {
    pub fn new(srs_document: impl Into<String>) -> Self {
        Self {
            srs_document: srs_document.into(),
            session_id: None,
            instructions: None,
            model: default_model(),
            temperature: None,
            model_override: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.srs_document.trim().is_empty() {
            return Err(Error::Validation("srs_document cannot be empty".to_string()));
        }
        if matches!(&self.session_id, Some(id) if id.trim().is_empty()) {
            return Err(Error::Validation("session_id cannot be blank".to_string()));
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.instructions.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => {
                format!("{PLANNER_PROMPT}\n\nAdditional instructions: {extra}")
            }
            _ => PLANNER_PROMPT.to_string(),
        }
    }
}

/// Task priority or complexity rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

/// Acceptance criteria, given either as prose or as a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Criteria {
    Text(String),
    List(Vec<String>),
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub id: String,
    pub task_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technical_requirements: String,
    #[serde(default)]
    pub acceptance_criteria: Criteria,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub assigned_to: String,
    pub priority: Option<Level>,
    pub complexity: Option<Level>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String { "open".to_string() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    #[serde(default)]
    pub project_analysis: String,
    pub tasks: Vec<PlannedTask>,
}

/// Parsed plan, or the model's raw text when it could not be parsed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskPlanResult {
    Plan(TaskPlan),
    Raw { raw_response: String },
}

impl TaskPlanResult {
    pub fn plan(&self) -> Option<&TaskPlan> {
        match self {
            TaskPlanResult::Plan(plan) => Some(plan),
            TaskPlanResult::Raw { .. } => None,
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string, e.g. "json"
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Parse a model reply as a task plan: the whole reply without code
/// fences, then the outermost `{...}` span, then give up and keep the text
pub fn parse_task_plan(reply: &str) -> TaskPlanResult {
    if let Ok(plan) = serde_json::from_str::<TaskPlan>(strip_code_fence(reply)) {
        return TaskPlanResult::Plan(plan);
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            match serde_json::from_str::<TaskPlan>(&reply[start..=end]) {
                Ok(plan) => return TaskPlanResult::Plan(plan),
                Err(e) => warn!(error = %e, "Task plan reply is not valid JSON"),
            }
        }
    }

    TaskPlanResult::Raw {
        raw_response: reply.to_string(),
    }
}

/// Plan result with the budget it was generated under
#[derive(Debug)]
pub struct PlannedOutcome {
    pub outcome: BudgetOutcome,
    pub result: TaskPlanResult,
}

/// Breaks requirements documents into task plans
pub struct TaskPlanner {
    model: Arc<dyn ChatModel>,
    budgeter: Arc<ContextBudgeter>,
    store: Arc<dyn ConversationStore>,
    default_temperature: f32,
}

impl TaskPlanner {
    pub fn new(
        model: Arc<dyn ChatModel>,
        budgeter: Arc<ContextBudgeter>,
        store: Arc<dyn ConversationStore>,
        default_temperature: f32,
    ) -> Self {
        Self {
            model,
            budgeter,
            store,
            default_temperature,
        }
    }

    pub async fn budget(&self, request: &TaskPlanRequest) -> Result<BudgetOutcome> {
        request.validate()?;

        let prior_turn = match &request.session_id {
            Some(session_id) => self.store.full_history_text(session_id, TurnKind::Plan).await,
            None => String::new(),
        };

        let mut budget = BudgetRequest::new(&request.model, request.prompt())
            .with_prior_turn(prior_turn)
            .with_file_text(request.srs_document.clone());
        if let Some(record) = &request.model_override {
            budget = budget.with_model_override(record.clone());
        }

        Ok(self.budgeter.build(&budget)?)
    }

    pub async fn plan(&self, request: TaskPlanRequest) -> Result<PlannedOutcome> {
        let outcome = self.budget(&request).await?;
        let decision = outcome.decision();
        ensure_room_for_output(decision)?;

        let temperature = request.temperature.unwrap_or(self.default_temperature);
        let generation = GenerationRequest::from_decision(decision, temperature);
        let reply = self.model.complete(&generation).await?;
        let result = parse_task_plan(&reply);

        match result.plan() {
            Some(plan) => info!(tasks = plan.tasks.len(), model = decision.resolved_model_name(), "Task plan generated"),
            None => warn!(model = decision.resolved_model_name(), "Returning unparsed task plan"),
        }

        if let Some(session_id) = &request.session_id {
            let user = request.instructions.as_deref().unwrap_or("Generate a task plan");
            if let Err(e) = self
                .store
                .record_exchange(session_id, TurnKind::Plan, user, &reply)
                .await
            {
                warn!(session_id = %session_id, error = %e, "Failed to record task plan exchange");
            }
        }

        Ok(PlannedOutcome { outcome, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{budgeter, FakeModel};
    use crate::conversation::{ConversationConfig, MemoryConversationStore};

    const PLAN_JSON: &str = r#"{
        "project_analysis": "A clinic portal",
        "tasks": [
            {
                "id": "TASK-001",
                "task_title": "Schema",
                "description": "Design tables",
                "technical_requirements": "PostgreSQL",
                "acceptance_criteria": ["Migrations run", "Indexes exist"],
                "dependencies": null,
                "assigned_to": "Database Engineer",
                "priority": "High",
                "complexity": "medium",
                "estimated_hours": 6,
                "status": "open"
            },
            {
                "id": "TASK-002",
                "task_title": "Login API",
                "description": "Session endpoints",
                "technical_requirements": "OAuth",
                "acceptance_criteria": "Users can log in",
                "dependencies": ["TASK-001"],
                "assigned_to": "Backend Developer",
                "priority": "high",
                "complexity": "low",
                "estimated_hours": 4.5
            }
        ]
    }"#;

    fn planner(model: Arc<FakeModel>) -> (TaskPlanner, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new(&ConversationConfig::default()));
        (TaskPlanner::new(model, budgeter(), store.clone(), 0.2), store)
    }

    fn request() -> TaskPlanRequest {
        let mut request = TaskPlanRequest::new("The system shall let clinics book rooms.");
        request.model = "small".to_string();
        request
    }

    #[test]
    fn test_parse_plain_json() {
        let plan = parse_task_plan(PLAN_JSON);
        let plan = plan.plan().unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].priority, Some(Level::High));
        assert_eq!(plan.tasks[0].dependencies, None);
        assert_eq!(
            plan.tasks[0].acceptance_criteria,
            Criteria::List(vec!["Migrations run".into(), "Indexes exist".into()])
        );
        assert_eq!(plan.tasks[1].dependencies, Some(vec!["TASK-001".to_string()]));
        assert_eq!(plan.tasks[1].status, "open");
        assert_eq!(plan.tasks[1].estimated_hours, Some(4.5));
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = format!("```json\n{PLAN_JSON}\n```");
        assert!(parse_task_plan(&reply).plan().is_some());
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let reply = format!("Here is the plan you asked for:\n{PLAN_JSON}\nLet me know!");
        assert_eq!(parse_task_plan(&reply).plan().unwrap().project_analysis, "A clinic portal");
    }

    #[test]
    fn test_unparseable_reply_kept_raw() {
        let result = parse_task_plan("I cannot plan {this}");
        assert_eq!(
            result,
            TaskPlanResult::Raw {
                raw_response: "I cannot plan {this}".to_string()
            }
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "raw_response": "I cannot plan {this}" })
        );
    }

    #[tokio::test]
    async fn test_document_is_attached_as_file() {
        let (planner, _store) = planner(FakeModel::replying(PLAN_JSON));
        let outcome = planner.budget(&request()).await.unwrap();
        let prompt = &outcome.decision().final_prompt;

        assert!(prompt.starts_with("You are a task planner"));
        assert!(prompt.contains(
            "<USER_UPLOADED_FILE>: The system shall let clinics book rooms. </USER_UPLOADED_FILE>"
        ));
        assert!(!prompt.contains("PREVIOUS RESPONSE"));
    }

    #[tokio::test]
    async fn test_plan_records_dialog_for_session() {
        let model = FakeModel::replying(PLAN_JSON);
        let (planner, store) = planner(model.clone());

        let mut first = request();
        first.session_id = Some("p1".to_string());
        first.instructions = Some("Keep it small".to_string());
        let planned = planner.plan(first).await.unwrap();
        assert_eq!(planned.result.plan().unwrap().tasks.len(), 2);

        let sent = model.last_request().unwrap();
        assert!(sent.prompt.contains("Additional instructions: Keep it small"));

        let mut second = request();
        second.session_id = Some("p1".to_string());
        let outcome = planner.budget(&second).await.unwrap();
        assert!(outcome
            .decision()
            .final_prompt
            .contains("PREVIOUS RESPONSE: User: Keep it small\nAgent: {"));
        assert_eq!(store.turns("p1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let (planner, _store) = planner(FakeModel::upstream_error(429, "rate limit"));
        let err = planner.plan(request()).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_validation() {
        assert!(TaskPlanRequest::new(" ").validate().is_err());
        let mut request = request();
        request.session_id = Some(String::new());
        assert!(request.validate().is_err());
    }
}
