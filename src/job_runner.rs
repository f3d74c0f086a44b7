//! Builds the validation crew and runs it as a single completion call.
//!
//! The crew (agents and their chained tasks) is declarative: it is rendered
//! into one request for the hosted model. The returned report is passed
//! through as-is; its structure is never checked or repaired.

use crate::error::{ValidatorError, ValidatorResult};
use crate::llm_client::{CompletionClient, CompletionRequest, ToolCapability};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
    pub tools: Vec<ToolCapability>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: &'static str,
    /// Index into the crew's agents.
    pub agent: usize,
    /// Index of the task whose output feeds this one.
    pub context: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewSpec {
    pub agents: Vec<AgentSpec>,
    pub tasks: Vec<TaskSpec>,
}

impl CrewSpec {
    /// The three-agent validation crew for one idea.
    pub fn for_idea(idea: &str) -> Self {
        let agents = vec![
            AgentSpec {
                role: "Signal Scanner",
                goal: "Find 10-15 real, current quotes and market signals for the idea",
                backstory: "Expert at spotting current market signals in forums, social posts and news.",
                tools: vec![ToolCapability::WebSearch],
            },
            AgentSpec {
                role: "Scorecard Generator",
                goal: "Score the idea 0-100 with a breakdown (demand, competition, timing, feasibility)",
                backstory: "Objective analyst writing for non-technical founders.",
                tools: vec![],
            },
            AgentSpec {
                role: "Report Writer",
                goal: "Output ONLY clean markdown: scorecard, signals, recommendations",
                backstory: "Concise validation reporter. Never JSON, never long articles.",
                tools: vec![],
            },
        ];

        let tasks = vec![
            TaskSpec {
                description: format!("Scan real-time signals (X/Reddit/HN) for: {}", idea),
                expected_output: "10-15 quotes/signals with sources",
                agent: 0,
                context: None,
            },
            TaskSpec {
                description: "Generate a scorecard 0-100 with breakdown (demand, competition, timing, feasibility)"
                    .to_string(),
                expected_output: "Scorecard with overall score and explanations",
                agent: 1,
                context: Some(0),
            },
            TaskSpec {
                description: "Write a clean markdown report: scorecard, signals list, 5-8 recommendations/next steps"
                    .to_string(),
                expected_output: "Concise markdown report (800 words max)",
                agent: 2,
                context: Some(1),
            },
        ];

        Self { agents, tasks }
    }

    /// Union of the tools of all agents, in first-seen order.
    pub fn tools(&self) -> Vec<ToolCapability> {
        let mut tools = Vec::new();
        for tool in self.agents.iter().flat_map(|a| a.tools.iter()) {
            if !tools.contains(tool) {
                tools.push(*tool);
            }
        }
        tools
    }

    pub fn system_prompt(&self) -> String {
        let mut out = String::from(
            "You are a crew of agents validating a startup idea. Work through the tasks in order, \
             each agent using the output of its context task.\n\nAgents:",
        );
        for (i, agent) in self.agents.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} - goal: {}. {}",
                i + 1,
                agent.role,
                agent.goal,
                agent.backstory
            ));
        }
        out
    }

    pub fn task_prompt(&self, idea: &str) -> String {
        let mut out = format!("Idea: {}\n\nTasks:", idea);
        for (i, task) in self.tasks.iter().enumerate() {
            let role = self.agents.get(task.agent).map(|a| a.role).unwrap_or("Crew");
            out.push_str(&format!(
                "\n{}. [{}] {}\n   Expected output: {}",
                i + 1,
                role,
                task.description,
                task.expected_output
            ));
            if let Some(context) = task.context {
                out.push_str(&format!("\n   Uses the output of task {}", context + 1));
            }
        }
        out.push_str("\n\nReturn only the final task's markdown report.");
        out
    }

    pub fn to_request(&self, idea: &str) -> CompletionRequest {
        CompletionRequest {
            system: self.system_prompt(),
            prompt: self.task_prompt(idea),
            tools: self.tools(),
        }
    }
}

/// Runs the validation crew for `idea` against one client.
///
/// # Errors
///
/// [`ValidatorError::EmptyIdea`] for blank input (no call is made), or
/// whatever the client reports.
pub async fn run_validation_job(client: &dyn CompletionClient, idea: &str) -> ValidatorResult<String> {
    let idea = idea.trim();
    if idea.is_empty() {
        return Err(ValidatorError::EmptyIdea);
    }

    let request = CrewSpec::for_idea(idea).to_request(idea);
    info!("Running validation crew on {}", client.provider_name());
    client.complete(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Client that echoes a fixed reply and records each request.
    struct RecordingClient {
        reply: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &CompletionRequest) -> ValidatorResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_crew_tasks_are_chained() {
        let crew = CrewSpec::for_idea("meal plans");
        assert_eq!(crew.agents.len(), 3);
        assert_eq!(crew.tasks.len(), 3);
        assert_eq!(crew.tasks[0].context, None);
        assert_eq!(crew.tasks[1].context, Some(0));
        assert_eq!(crew.tasks[2].context, Some(1));
        assert!(crew.tasks[0].description.contains("meal plans"));
    }

    #[test]
    fn test_only_scanner_declares_web_search() {
        let crew = CrewSpec::for_idea("x");
        assert_eq!(crew.tools(), vec![ToolCapability::WebSearch]);
        assert_eq!(crew.agents[0].tools, vec![ToolCapability::WebSearch]);
        assert!(crew.agents[1].tools.is_empty());
    }

    #[test]
    fn test_request_mentions_roles_and_idea() {
        let request = CrewSpec::for_idea("AI meal planner").to_request("AI meal planner");
        assert!(request.system.contains("Signal Scanner"));
        assert!(request.system.contains("Report Writer"));
        assert!(request.prompt.starts_with("Idea: AI meal planner"));
        assert!(request.prompt.contains("Uses the output of task 2"));
    }

    #[tokio::test]
    async fn test_run_makes_one_call_and_passes_text_through() {
        let client = RecordingClient::new("not a report at all");

        let text = run_validation_job(&client, "  meal plans  ").await.unwrap();

        assert_eq!(text, "not a report at all");
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.starts_with("Idea: meal plans\n"));
    }

    #[tokio::test]
    async fn test_run_rejects_blank_idea_without_calling() {
        let client = RecordingClient::new("report");

        let err = run_validation_job(&client, " \n\t").await.unwrap_err();

        assert_eq!(err, ValidatorError::EmptyIdea);
        assert!(client.requests.lock().unwrap().is_empty());
    }
}
