//! Skirmish MCP Server
//!
//! Exposes the combat engine over the Model Context Protocol on stdio. Every
//! tool names its scene and actor explicitly, so one server can host many
//! fights at once. Logs go to stderr since stdout carries the protocol.

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, *},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use skirmish::interface::render_outcome;
use skirmish::{ActionRequest, CombatEngine, CombatError, CombatantId, EngineConfig, Line, SceneId};
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct SkirmishService {
    tool_router: ToolRouter<SkirmishService>,
    engine: Arc<CombatEngine>,
}

// Tool request structures
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StartCombatRequest {
    #[schemars(description = "Character id of the player starting the fight; their party joins them")]
    pub requester: String,
    #[schemars(description = "Encounter name to fight; a random encounter when omitted")]
    pub encounter: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SubmitActionRequest {
    #[schemars(description = "Scene id returned by start_combat")]
    pub scene_id: String,
    #[schemars(description = "Id of the acting combatant")]
    pub actor: String,
    #[schemars(description = "One of 'attack', 'move', 'ability', 'end_turn'")]
    pub action: String,
    #[schemars(description = "Ability name, required when action is 'ability'")]
    pub ability: Option<String>,
    #[schemars(description = "Target combatant id for attacks and targeted abilities")]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SceneRequest {
    #[schemars(description = "Scene id returned by start_combat")]
    pub scene_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetFormationRequest {
    #[schemars(description = "Character id")]
    pub character_id: String,
    #[schemars(description = "'front' or 'back'")]
    pub line: String,
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(format!("{}: {}", context, e)),
        data: None,
    }
}

fn invalid_params(message: String) -> McpError {
    McpError {
        code: ErrorCode(-32602),
        message: Cow::from(message),
        data: None,
    }
}

fn combat_error(context: &str, e: CombatError) -> McpError {
    match e {
        CombatError::SceneNotFound(_) | CombatError::Data(_) => invalid_params(format!("{}: {}", context, e)),
        other => internal_error(context, other),
    }
}

fn build_request(request: &SubmitActionRequest) -> Result<ActionRequest, McpError> {
    let actor = request.actor.as_str();
    match request.action.trim().to_lowercase().as_str() {
        "attack" => match &request.target {
            Some(target) => Ok(ActionRequest::attack(actor, target.as_str())),
            None => Err(invalid_params("attack needs a target".to_string())),
        },
        "move" => Ok(ActionRequest::movement(actor)),
        "ability" => match &request.ability {
            Some(name) => Ok(ActionRequest::ability(
                actor,
                name,
                request.target.as_deref().map(CombatantId::from),
            )),
            None => Err(invalid_params("ability needs an ability name".to_string())),
        },
        "end_turn" | "end" => Ok(ActionRequest::end_turn(actor)),
        other => Err(invalid_params(format!("Unknown action '{}'", other))),
    }
}

#[tool_router]
impl SkirmishService {
    pub fn new(engine: CombatEngine) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine: Arc::new(engine),
        }
    }

    #[tool(description = "Start a fight for a character and their party. Returns the scene id and the opening battlefield")]
    async fn start_combat(
        &self,
        Parameters(request): Parameters<StartCombatRequest>,
    ) -> Result<CallToolResult, McpError> {
        let started = match &request.encounter {
            Some(name) => {
                let encounter = self
                    .engine
                    .catalog()
                    .encounter(name)
                    .map_err(|e| invalid_params(e.to_string()))?
                    .clone();
                self.engine.start_encounter(&request.requester, &encounter)
            }
            None => self.engine.start_combat(&request.requester),
        }
        .map_err(|e| combat_error("Error starting combat", e))?;

        let text = format!("Scene id: {}\n\n{}", started.scene_id, started.snapshot);
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Submit an action for the combatant whose turn it is")]
    async fn submit_action(
        &self,
        Parameters(request): Parameters<SubmitActionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let action = build_request(&request)?;
        let outcome = self
            .engine
            .submit_action(&SceneId::new(request.scene_id), action)
            .map_err(|e| combat_error("Error submitting action", e))?;
        Ok(CallToolResult::success(vec![Content::text(render_outcome(&outcome))]))
    }

    #[tool(description = "Let enemy combatants take their turns until a player is up or the fight ends")]
    async fn advance_ai(
        &self,
        Parameters(request): Parameters<SceneRequest>,
    ) -> Result<CallToolResult, McpError> {
        let outcomes = self
            .engine
            .advance_ai(&SceneId::new(request.scene_id))
            .map_err(|e| combat_error("Error advancing enemies", e))?;
        let text = if outcomes.is_empty() {
            "No enemy is waiting to act.".to_string()
        } else {
            outcomes
                .iter()
                .map(render_outcome)
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Show the battlefield of an active fight")]
    async fn get_snapshot(
        &self,
        Parameters(request): Parameters<SceneRequest>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self
            .engine
            .get_snapshot(&SceneId::new(request.scene_id))
            .map_err(|e| combat_error("Error reading scene", e))?;
        Ok(CallToolResult::success(vec![Content::text(snapshot.to_string())]))
    }

    #[tool(description = "Choose which line a character takes when their next fight starts")]
    async fn set_formation(
        &self,
        Parameters(request): Parameters<SetFormationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let line: Line = request
            .line
            .parse()
            .map_err(|_| invalid_params(format!("Unknown line '{}'. Use 'front' or 'back'.", request.line)))?;
        self.engine
            .set_default_formation(&request.character_id, line)
            .map_err(|e| combat_error("Error setting formation", e))?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "{} will take the {}.",
            request.character_id, line
        ))]))
    }

    #[tool(description = "Abandon a fight. Survivors keep their wounds and earn nothing")]
    async fn abort_combat(
        &self,
        Parameters(request): Parameters<SceneRequest>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self
            .engine
            .abort_scene(&SceneId::new(request.scene_id))
            .map_err(|e| combat_error("Error aborting combat", e))?;
        Ok(CallToolResult::success(vec![Content::text(snapshot.to_string())]))
    }
}

#[tool_handler]
impl ServerHandler for SkirmishService {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skirmish=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("skirmish.ron"));
    let config = EngineConfig::load(&config_path)?;
    let engine = CombatEngine::open(config)?;
    let report = engine.recover()?;
    if !report.corrupt.is_empty() {
        tracing::warn!(corrupt = report.corrupt.len(), "some stored scenes are corrupt and will be refused");
    }

    tracing::info!("Skirmish MCP server starting");
    let service = SkirmishService::new(engine);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!(?quit_reason, "Skirmish MCP server exiting");
    Ok(())
}
