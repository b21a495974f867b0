//! Declarative table of catalog endpoints.
//!
//! Each entry describes one tool: its HTTP method and path template, whether
//! it needs the user's bearer token, and its parameters. Tool schemas and
//! outgoing requests are both derived from the same entry.

use mal_mcp_server::McpTool;
use serde_json::{json, Map, Value as JsonValue};

use crate::error::ToolError;

/// Who may call an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Identified by the client ID header only.
    Public,
    /// Requires the user's bearer token.
    Privileged,
}

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// JSON type accepted for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Free text.
    String,
    /// Whole number.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// List of strings, sent comma-joined.
    StringList,
}

impl ParamKind {
    fn schema(&self) -> JsonValue {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::StringList => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

/// Where a parameter goes in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Substituted into the path template.
    Path,
    /// Appended to the query string.
    Query,
    /// Sent in a form-encoded body.
    Form,
}

/// One tool parameter.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    /// Argument name, also the wire name.
    pub name: &'static str,
    /// Accepted type.
    pub kind: ParamKind,
    /// Request placement.
    pub location: Location,
    /// Description shown to the client.
    pub description: &'static str,
    /// Whether the argument must be supplied.
    pub required: bool,
    /// Wire value sent when the argument is absent.
    pub default: Option<&'static str>,
    /// Allowed values, empty for any.
    pub choices: &'static [&'static str],
    /// Inclusive bounds for integers.
    pub range: Option<(i64, i64)>,
}

impl Param {
    const fn new(
        name: &'static str,
        kind: ParamKind,
        location: Location,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            location,
            description,
            required: false,
            default: None,
            choices: &[],
            range: None,
        }
    }

    const fn path(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self::new(name, kind, Location::Path, description).required()
    }

    const fn query(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self::new(name, kind, Location::Query, description)
    }

    const fn form(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self::new(name, kind, Location::Form, description)
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    const fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    fn schema(&self) -> JsonValue {
        let mut schema = self.kind.schema();
        schema["description"] = json!(self.description);
        if !self.choices.is_empty() {
            let choices = json!(self.choices);
            match self.kind {
                ParamKind::StringList => schema["items"]["enum"] = choices,
                _ => schema["enum"] = choices,
            }
        }
        if let Some((min, max)) = self.range {
            schema["minimum"] = json!(min);
            schema["maximum"] = json!(max);
        }
        if let Some(default) = self.default {
            schema["default"] = match self.kind {
                ParamKind::Integer => default.parse::<i64>().map_or(json!(default), |n| json!(n)),
                ParamKind::Boolean => json!(default == "true"),
                ParamKind::StringList => json!(default.split(',').collect::<Vec<_>>()),
                ParamKind::String => json!(default),
            };
        }
        schema
    }

    /// Convert a supplied argument into its wire form.
    fn encode(&self, value: &JsonValue) -> Result<String, ToolError> {
        let wire = match (self.kind, value) {
            (ParamKind::String, JsonValue::String(s)) => s.clone(),
            (ParamKind::Integer, JsonValue::Number(n)) => {
                let n = n.as_i64().ok_or_else(|| self.type_error("an integer"))?;
                if let Some((min, max)) = self.range {
                    if !(min..=max).contains(&n) {
                        return Err(ToolError::invalid_arguments(format!(
                            "argument '{}' must be between {min} and {max}, got {n}",
                            self.name
                        )));
                    }
                }
                n.to_string()
            }
            (ParamKind::Boolean, JsonValue::Bool(b)) => b.to_string(),
            (ParamKind::StringList, JsonValue::Array(items)) => {
                let items = items
                    .iter()
                    .map(|item| item.as_str().ok_or_else(|| self.type_error("a list of strings")))
                    .collect::<Result<Vec<_>, _>>()?;
                for item in &items {
                    self.check_choice(item)?;
                }
                return Ok(items.join(","));
            }
            // A bare string is taken as an already comma-joined list.
            (ParamKind::StringList, JsonValue::String(s)) => return Ok(s.clone()),
            (ParamKind::String, _) => return Err(self.type_error("a string")),
            (ParamKind::Integer, _) => return Err(self.type_error("an integer")),
            (ParamKind::Boolean, _) => return Err(self.type_error("a boolean")),
            (ParamKind::StringList, _) => return Err(self.type_error("a list of strings")),
        };
        self.check_choice(&wire)?;
        Ok(wire)
    }

    fn check_choice(&self, value: &str) -> Result<(), ToolError> {
        if self.choices.is_empty() || self.choices.contains(&value) {
            return Ok(());
        }
        Err(ToolError::invalid_arguments(format!(
            "argument '{}' must be one of {}, got '{value}'",
            self.name,
            self.choices.join(", ")
        )))
    }

    fn type_error(&self, expected: &str) -> ToolError {
        ToolError::invalid_arguments(format!("argument '{}' must be {expected}", self.name))
    }
}

/// A request derived from an endpoint and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the API base URL, already percent-encoded.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(&'static str, String)>,
    /// Form body fields; empty means no body.
    pub form: Vec<(&'static str, String)>,
}

/// One catalog endpoint exposed as a tool.
#[derive(Debug)]
pub struct Endpoint {
    /// Tool name.
    pub name: &'static str,
    /// Tool description.
    pub description: &'static str,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template with `{param}` placeholders.
    pub path: &'static str,
    /// Required credentials.
    pub access: Access,
    /// Accepted parameters.
    pub params: &'static [Param],
}

impl Endpoint {
    /// JSON Schema of the tool's arguments.
    pub fn input_schema(&self) -> JsonValue {
        let properties: Map<String, JsonValue> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// MCP tool definition.
    pub fn definition(&self) -> McpTool {
        McpTool::new(self.name, self.input_schema()).with_description(self.description)
    }

    /// Validate `arguments` and lay them out as a request.
    ///
    /// `null` arguments are treated as absent.
    pub fn prepare(&self, arguments: &JsonValue) -> Result<PreparedRequest, ToolError> {
        let empty = Map::new();
        let args = match arguments {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            _ => return Err(ToolError::invalid_arguments("arguments must be an object")),
        };

        if let Some(unknown) = args
            .keys()
            .find(|key| !self.params.iter().any(|p| p.name == key.as_str()))
        {
            return Err(ToolError::invalid_arguments(format!(
                "unknown argument '{unknown}' for {}",
                self.name
            )));
        }

        let mut path = self.path.to_string();
        let mut query = Vec::new();
        let mut form = Vec::new();

        for param in self.params {
            let value = match args.get(param.name).filter(|v| !v.is_null()) {
                Some(value) => param.encode(value)?,
                None => match param.default {
                    Some(default) => default.to_string(),
                    None if param.required => {
                        return Err(ToolError::invalid_arguments(format!(
                            "missing required argument '{}'",
                            param.name
                        )));
                    }
                    None => continue,
                },
            };

            match param.location {
                Location::Path => {
                    let placeholder = format!("{{{}}}", param.name);
                    path = path.replace(&placeholder, &urlencoding::encode(&value));
                }
                Location::Query => query.push((param.name, value)),
                Location::Form => form.push((param.name, value)),
            }
        }

        Ok(PreparedRequest {
            method: self.method,
            path,
            query,
            form,
        })
    }
}

/// Look up an endpoint by tool name.
pub fn find(name: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|e| e.name == name)
}

const DEFAULT_DETAIL_FIELDS: &str = "id,title,main_picture";

const ANIME_RANKINGS: &[&str] = &[
    "all",
    "airing",
    "upcoming",
    "tv",
    "ova",
    "movie",
    "special",
    "bypopularity",
    "favorite",
];
const MANGA_RANKINGS: &[&str] = &[
    "all",
    "manga",
    "novels",
    "oneshots",
    "doujin",
    "manhwa",
    "manhua",
    "bypopularity",
    "favorite",
];
const SEASONS: &[&str] = &["winter", "spring", "summer", "fall"];
const SEASON_SORTS: &[&str] = &["anime_score", "anime_num_list_users"];
const ANIME_STATUSES: &[&str] = &["watching", "completed", "on_hold", "dropped", "plan_to_watch"];
const ANIME_LIST_SORTS: &[&str] = &[
    "list_score",
    "list_updated_at",
    "anime_title",
    "anime_start_date",
];
const MANGA_STATUSES: &[&str] = &["reading", "completed", "on_hold", "dropped", "plan_to_read"];
const MANGA_LIST_SORTS: &[&str] = &[
    "list_score",
    "list_updated_at",
    "manga_title",
    "manga_start_date",
];

const ANIME_FIELDS_HELP: &str = "Fields to include. Defaults to id, title, main_picture. \
Valid fields: id, title, main_picture, alternative_titles, start_date, end_date, synopsis, \
mean, rank, popularity, num_list_users, num_scoring_users, nsfw, created_at, updated_at, \
media_type, status, genres, my_list_status, num_episodes, start_season, broadcast, source, \
average_episode_duration, rating, pictures, background, related_anime, related_manga, \
recommendations, studios, statistics.";

const MANGA_FIELDS_HELP: &str = "Fields to include. Defaults to id, title, main_picture. \
Valid fields: id, title, main_picture, alternative_titles, start_date, end_date, synopsis, \
mean, rank, popularity, num_list_users, num_scoring_users, nsfw, created_at, updated_at, \
media_type, status, genres, my_list_status, num_volumes, num_chapters, authors, pictures, \
background, related_anime, related_manga, recommendations, serialization.";

const fn limit(max: i64) -> Param {
    Param::query(
        "limit",
        ParamKind::Integer,
        "Number of results to return.",
    )
    .default("10")
    .range(1, max)
}

const OFFSET: Param = Param::query("offset", ParamKind::Integer, "Offset for pagination.")
    .default("0")
    .range(0, i32::MAX as i64);

const USERNAME: Param = Param::path(
    "username",
    ParamKind::String,
    "MyAnimeList username, or @me for the signed-in user.",
);

const TAGS: Param = Param::form("tags", ParamKind::StringList, "Tags for the list entry.");
const COMMENTS: Param = Param::form("comments", ParamKind::String, "Comments for the list entry.");
const SCORE: Param = Param::form("score", ParamKind::Integer, "Score from 0 to 10.").range(0, 10);
const PRIORITY: Param =
    Param::form("priority", ParamKind::Integer, "Priority from 0 to 2.").range(0, 2);

/// Every endpoint exposed as a tool.
pub static ENDPOINTS: &[Endpoint] = &[
    // Anime
    Endpoint {
        name: "get_anime",
        description: "Search MyAnimeList for anime matching a query.",
        method: HttpMethod::Get,
        path: "/anime",
        access: Access::Public,
        params: &[
            Param::query("q", ParamKind::String, "Search query.").required(),
            limit(100),
            OFFSET,
        ],
    },
    Endpoint {
        name: "get_anime_details",
        description: "Fetch details of an anime by its ID. Examples: fields=[\"mean\"] for \
the score, fields=[\"recommendations\"] for similar anime, fields=[\"genres\", \"synopsis\"].",
        method: HttpMethod::Get,
        path: "/anime/{anime_id}",
        access: Access::Public,
        params: &[
            Param::path("anime_id", ParamKind::Integer, "MyAnimeList anime ID."),
            Param::query("fields", ParamKind::StringList, ANIME_FIELDS_HELP)
                .default(DEFAULT_DETAIL_FIELDS),
        ],
    },
    Endpoint {
        name: "get_anime_ranking",
        description: "Fetch anime rankings.",
        method: HttpMethod::Get,
        path: "/anime/ranking",
        access: Access::Public,
        params: &[
            Param::query("ranking_type", ParamKind::String, "Ranking to fetch.")
                .default("all")
                .choices(ANIME_RANKINGS),
            limit(500),
            OFFSET,
        ],
    },
    Endpoint {
        name: "get_seasonal_anime",
        description: "Fetch anime airing in a given season.",
        method: HttpMethod::Get,
        path: "/anime/season/{year}/{season}",
        access: Access::Public,
        params: &[
            Param::path("year", ParamKind::Integer, "Year of the season."),
            Param::path("season", ParamKind::String, "Season of the year.").choices(SEASONS),
            Param::query("sort", ParamKind::String, "Sort order.").choices(SEASON_SORTS),
            limit(500),
            OFFSET,
        ],
    },
    Endpoint {
        name: "get_anime_list",
        description: "Fetch a user's anime list.",
        method: HttpMethod::Get,
        path: "/users/{username}/animelist",
        access: Access::Public,
        params: &[
            USERNAME,
            Param::query("status", ParamKind::String, "List status to fetch.")
                .required()
                .choices(ANIME_STATUSES),
            Param::query("sort", ParamKind::String, "Sort order.").choices(ANIME_LIST_SORTS),
            limit(1000),
            OFFSET,
        ],
    },
    // Manga
    Endpoint {
        name: "get_manga",
        description: "Search MyAnimeList for manga matching a query.",
        method: HttpMethod::Get,
        path: "/manga",
        access: Access::Public,
        params: &[
            Param::query("q", ParamKind::String, "Search query.").required(),
            limit(100),
            OFFSET,
        ],
    },
    Endpoint {
        name: "get_manga_details",
        description: "Fetch details of a manga by its ID. Examples: fields=[\"mean\"] for \
the score, fields=[\"recommendations\"] for similar manga, fields=[\"genres\", \"synopsis\"].",
        method: HttpMethod::Get,
        path: "/manga/{manga_id}",
        access: Access::Public,
        params: &[
            Param::path("manga_id", ParamKind::Integer, "MyAnimeList manga ID."),
            Param::query("fields", ParamKind::StringList, MANGA_FIELDS_HELP)
                .default(DEFAULT_DETAIL_FIELDS),
        ],
    },
    Endpoint {
        name: "get_manga_ranking",
        description: "Fetch manga rankings.",
        method: HttpMethod::Get,
        path: "/manga/ranking",
        access: Access::Public,
        params: &[
            Param::query("ranking_type", ParamKind::String, "Ranking to fetch.")
                .default("all")
                .choices(MANGA_RANKINGS),
            limit(500),
            OFFSET,
        ],
    },
    Endpoint {
        name: "get_manga_list",
        description: "Fetch a user's manga list.",
        method: HttpMethod::Get,
        path: "/users/{username}/mangalist",
        access: Access::Public,
        params: &[
            USERNAME,
            Param::query("status", ParamKind::String, "List status to fetch.")
                .required()
                .choices(MANGA_STATUSES),
            Param::query("sort", ParamKind::String, "Sort order.").choices(MANGA_LIST_SORTS),
            limit(1000),
            OFFSET,
        ],
    },
    // Signed-in user
    Endpoint {
        name: "get_suggested_anime",
        description: "Fetch anime suggested for the signed-in user. Requires authorization.",
        method: HttpMethod::Get,
        path: "/anime/suggestions",
        access: Access::Privileged,
        params: &[limit(100), OFFSET],
    },
    Endpoint {
        name: "get_user_profile",
        description: "Fetch the signed-in user's profile. Requires authorization.",
        method: HttpMethod::Get,
        path: "/users/@me",
        access: Access::Privileged,
        params: &[Param::query(
            "fields",
            ParamKind::StringList,
            "Extra fields, e.g. anime_statistics.",
        )],
    },
    Endpoint {
        name: "update_my_anime_list",
        description: "Add an anime to the signed-in user's list or update its entry. \
Requires authorization.",
        method: HttpMethod::Patch,
        path: "/anime/{anime_id}/my_list_status",
        access: Access::Privileged,
        params: &[
            Param::path("anime_id", ParamKind::Integer, "MyAnimeList anime ID."),
            Param::form("status", ParamKind::String, "Watch status.").choices(ANIME_STATUSES),
            Param::form("is_rewatching", ParamKind::Boolean, "Whether it is being rewatched."),
            SCORE,
            Param::form(
                "num_watched_episodes",
                ParamKind::Integer,
                "Episodes watched.",
            )
            .range(0, i32::MAX as i64),
            PRIORITY,
            Param::form("num_times_rewatched", ParamKind::Integer, "Times rewatched.")
                .range(0, i32::MAX as i64),
            Param::form("rewatch_value", ParamKind::Integer, "Rewatch value from 0 to 5.")
                .range(0, 5),
            TAGS,
            COMMENTS,
        ],
    },
    Endpoint {
        name: "delete_my_anime_list_item",
        description: "Remove an anime from the signed-in user's list. Requires authorization.",
        method: HttpMethod::Delete,
        path: "/anime/{anime_id}/my_list_status",
        access: Access::Privileged,
        params: &[Param::path(
            "anime_id",
            ParamKind::Integer,
            "MyAnimeList anime ID.",
        )],
    },
    Endpoint {
        name: "update_my_manga_list",
        description: "Add a manga to the signed-in user's list or update its entry. \
Requires authorization.",
        method: HttpMethod::Patch,
        path: "/manga/{manga_id}/my_list_status",
        access: Access::Privileged,
        params: &[
            Param::path("manga_id", ParamKind::Integer, "MyAnimeList manga ID."),
            Param::form("status", ParamKind::String, "Reading status.").choices(MANGA_STATUSES),
            Param::form("is_rereading", ParamKind::Boolean, "Whether it is being reread."),
            SCORE,
            Param::form("num_volumes_read", ParamKind::Integer, "Volumes read.")
                .range(0, i32::MAX as i64),
            Param::form("num_chapters_read", ParamKind::Integer, "Chapters read.")
                .range(0, i32::MAX as i64),
            PRIORITY,
            Param::form("num_times_reread", ParamKind::Integer, "Times reread.")
                .range(0, i32::MAX as i64),
            Param::form("reread_value", ParamKind::Integer, "Reread value from 0 to 5.")
                .range(0, 5),
            TAGS,
            COMMENTS,
        ],
    },
    Endpoint {
        name: "delete_my_manga_list_item",
        description: "Remove a manga from the signed-in user's list. Requires authorization.",
        method: HttpMethod::Delete,
        path: "/manga/{manga_id}/my_list_status",
        access: Access::Privileged,
        params: &[Param::path(
            "manga_id",
            ParamKind::Integer,
            "MyAnimeList manga ID.",
        )],
    },
];
