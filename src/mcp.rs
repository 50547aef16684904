use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    category::Category,
    error::{self, Error},
    matching::{self, PageMatchReport},
    settings::Settings,
    store::StoreHandle,
};

const DEFAULT_PERSON_LIMIT: usize = 50;

struct PagecardState {
    store: StoreHandle,
    image_base_url: String,
}

#[derive(Clone)]
pub struct PagecardMcpServer {
    state: Arc<PagecardState>,
    tool_router: ToolRouter<Self>,
}

impl PagecardMcpServer {
    pub fn new(store: StoreHandle, image_base_url: String) -> Self {
        Self {
            state: Arc::new(PagecardState {
                store,
                image_base_url,
            }),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl PagecardMcpServer {
    /// Rank document pages by how many of the given persons appear on them.
    #[tool(
        name = "pagecard_find_pages",
        description = "Find document pages showing the given persons together. Pages with more of the persons rank first."
    )]
    pub async fn pagecard_find_pages(
        &self,
        params: Parameters<FindPagesParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let store = self.state.store.get().map_err(to_mcp_error)?;

        let mut report = matching::find_matching_pages(
            store,
            &self.state.image_base_url,
            &params.person_ids,
        )
        .map_err(to_mcp_error)?;
        if let Some(limit) = params.limit {
            report.limit_pages(limit);
        }

        let summary = format_pages_summary(&report);
        let structured = serde_json::to_value(&report)
            .map_err(|e| mcp_error("failed to serialize pages", e))?;

        Ok(structured_result(summary, structured))
    }

    /// List known persons, optionally filtered by name and category.
    #[tool(
        name = "pagecard_list_persons",
        description = "List persons with their ids, categories and appearance counts. Use the ids with pagecard_find_pages."
    )]
    pub async fn pagecard_list_persons(
        &self,
        params: Parameters<ListPersonsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let store = self.state.store.get().map_err(to_mcp_error)?;

        let matches =
            store.filter_persons(params.search.as_deref(), params.category);
        let total = matches.len();
        let persons: Vec<PersonItem> = matches
            .into_iter()
            .take(params.limit.unwrap_or(DEFAULT_PERSON_LIMIT))
            .map(|p| PersonItem {
                id: p.id.clone(),
                name: p.name.clone(),
                category: p.category,
                appearance_count: p.appearances.len(),
            })
            .collect();

        let summary = format_persons_summary(&persons, total);
        let structured = serde_json::to_value(PersonsResponse {
            total,
            persons,
        })
        .map_err(|e| mcp_error("failed to serialize persons", e))?;

        Ok(structured_result(summary, structured))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for PagecardMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("pagecard", env!("CARGO_PKG_VERSION"))
                    .with_title("pagecard MCP"),
            )
            .with_instructions(
                "Use pagecard_list_persons to look up person ids, then pagecard_find_pages to find pages where they appear together.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindPagesParams {
    /// Person ids, as returned by pagecard_list_persons.
    pub person_ids: Vec<String>,
    /// Maximum number of pages returned (default: all).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListPersonsParams {
    /// Case-insensitive substring of the person's name.
    pub search: Option<String>,
    /// Restrict to one category.
    pub category: Option<Category>,
    /// Maximum number of persons returned (default: 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonsResponse {
    total: usize,
    persons: Vec<PersonItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonItem {
    id: String,
    name: String,
    category: Category,
    appearance_count: usize,
}

fn format_pages_summary(report: &PageMatchReport) -> String {
    if report.pages.is_empty() {
        return format!(
            "No pages found for {} requested person(s)",
            report.total_requested
        );
    }

    let mut lines = Vec::with_capacity(report.pages.len() + 1);
    lines.push(format!(
        "Found {} page(s); best page shows {} of {} persons:",
        report.total_pages, report.best_match_count, report.resolved_persons
    ));
    for p in &report.pages {
        lines.push(format!(
            "{}. {} p.{} ({}) {}",
            p.rank,
            p.file,
            p.page,
            p.matched_persons.join(", "),
            p.image_url
        ));
    }
    lines.join("\n")
}

fn structured_result(summary: String, structured: Value) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = Some(structured);
    result
}

fn format_persons_summary(persons: &[PersonItem], total: usize) -> String {
    if persons.is_empty() {
        return "No persons found".to_string();
    }

    let mut lines = Vec::with_capacity(persons.len() + 1);
    lines.push(format!("Showing {} of {total} person(s):", persons.len()));
    for p in persons {
        lines.push(format!(
            "{} {} [{}] {} appearance(s)",
            p.id, p.name, p.category, p.appearance_count
        ));
    }
    lines.join("\n")
}

fn to_mcp_error(error: Error) -> rmcp::ErrorData {
    match error {
        Error::InvalidRequest(msg) => {
            rmcp::ErrorData::invalid_params(msg, None)
        }
        other => mcp_error("request failed", other),
    }
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(settings: &Settings) -> error::Result<()> {
    let store = StoreHandle::load(&settings.persons_path);
    let server =
        PagecardMcpServer::new(store, settings.image_base_url.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            Error::Config(format!("MCP server initialization failed: {e}"))
        })?;
        running
            .waiting()
            .await
            .map_err(|e| Error::Config(format!("MCP server error: {e}")))?;
        Ok(())
    })
}
