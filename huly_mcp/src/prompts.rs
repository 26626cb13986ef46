//! Prompt templates. Placeholders use minijinja syntax and are filled from the
//! prompt arguments, with the declared default for any argument left out.
use mcp_core::PromptMessageRole;
use mcp_server::{
    Registry, RegistryError,
    registry::{PromptParam, PromptRoute},
};

const TASK_CREATION: &str = "Please help me create a well-structured {{ task_type }} for the {{ project_name }} project. \n\
\n\
The task should include:\n\
- A clear and concise title\n\
- Detailed description of what needs to be done\n\
- Acceptance criteria or definition of done\n\
- Priority level (low, medium, high, urgent)\n\
- Estimated effort or complexity\n\
- Any dependencies or related tasks\n\
- Due date if applicable\n\
\n\
Please ask me for any additional information needed to create a comprehensive task.";

const SPRINT_PLANNING: &str = "Let's plan {{ sprint_number }} for {{ team_name }}. Please help me organize the sprint planning session.\n\
\n\
We should cover:\n\
- Sprint goal and objectives\n\
- Available capacity and team velocity\n\
- Backlog prioritization\n\
- Task breakdown and estimation\n\
- Risk assessment and mitigation\n\
- Sprint commitment and deliverables\n\
- Dependencies and blockers\n\
\n\
Please guide me through each section and help create a comprehensive sprint plan.";

const PROJECT_STATUS: &str = "Please help me create a comprehensive status report for {{ project_name }} covering {{ period }}.\n\
\n\
The report should include:\n\
- Executive summary\n\
- Key accomplishments and milestones\n\
- Progress against goals and timelines\n\
- Current sprint/iteration status\n\
- Team performance metrics\n\
- Risks and issues\n\
- Budget and resource utilization\n\
- Next steps and upcoming priorities\n\
- Recommendations and action items\n\
\n\
Please analyze the project data and create a detailed status report.";

const MEETING_NOTES: &str = "Please help me create structured notes for this {{ meeting_type }} with {{ participants }}.\n\
\n\
The notes should include:\n\
- Meeting details (date, time, participants)\n\
- Agenda items and discussion points\n\
- Key decisions made\n\
- Action items with owners and due dates\n\
- Next steps and follow-up tasks\n\
- Parking lot items or future considerations\n\
- Summary and key takeaways\n\
\n\
Please provide a template and help organize the meeting information effectively.";

fn project_name() -> PromptParam {
    PromptParam::new("project_name", "Project")
        .required()
        .describe("Name of the project")
}

pub fn prompts() -> Vec<PromptRoute> {
    vec![
        PromptRoute::new("task_creation", "Template for creating well-structured tasks")
            .argument(project_name())
            .argument(
                PromptParam::new("task_type", "task")
                    .describe("Type of task (feature, bug, improvement, etc.)"),
            )
            .description("Create a {{ task_type }} for {{ project_name }}")
            .message(PromptMessageRole::User, TASK_CREATION),
        PromptRoute::new("sprint_planning", "Template for sprint planning sessions")
            .argument(
                PromptParam::new("sprint_number", "Next Sprint")
                    .required()
                    .describe("Sprint number or identifier"),
            )
            .argument(PromptParam::new("team_name", "the team").describe("Name of the team"))
            .description("Sprint planning template for {{ sprint_number }}")
            .message(PromptMessageRole::User, SPRINT_PLANNING),
        PromptRoute::new("project_status", "Template for project status reports")
            .argument(project_name())
            .argument(
                PromptParam::new("period", "this period")
                    .describe("Reporting period (week, month, quarter)"),
            )
            .description("Project status report for {{ project_name }}")
            .message(PromptMessageRole::User, PROJECT_STATUS),
        PromptRoute::new("meeting_notes", "Template for meeting notes and action items")
            .argument(
                PromptParam::new("meeting_type", "meeting")
                    .required()
                    .describe("Type of meeting (standup, planning, retrospective, etc.)"),
            )
            .argument(PromptParam::new("participants", "team members").describe("Meeting participants"))
            .description("Meeting notes template for {{ meeting_type }}")
            .message(PromptMessageRole::User, MEETING_NOTES),
    ]
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    prompts()
        .into_iter()
        .try_for_each(|route| registry.register_prompt(route))
}
