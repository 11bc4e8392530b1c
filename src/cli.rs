//! CLI domain: parse, route, and output only.
//! No bridge logic here; the route table dispatches to the bridge and the HTTP client.

mod output;
mod parse;
mod route;

pub use output::{format_response, map_error};
pub use parse::{parse_param, Cli, Commands};
pub use route::{RunContext, RunOutput};
