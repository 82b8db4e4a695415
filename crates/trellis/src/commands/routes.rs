//! `trellis routes`: the request methods a model generates.

use serde::Serialize;
use tabled::Tabled;
use tracing::debug;
use trellis_api::Verb;

use crate::cli::{GlobalOpts, OutputFormat, RoutesArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct RouteInfo {
    method: String,
    verb: String,
    #[serde(skip)]
    kind: Verb,
    template: String,
    params: Vec<String>,
    json_body: bool,
}

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Verb")]
    verb: String,
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Body")]
    body: &'static str,
}

pub fn handle(args: &RoutesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let def = util::resolve_model(&cfg, &args.model)?;
    debug!(model = def.name(), routes = def.routes().len(), "model resolved");

    let routes: Vec<RouteInfo> = def
        .routes()
        .iter()
        .map(|route| RouteInfo {
            method: route.method_name().to_owned(),
            verb: route.verb().to_string(),
            kind: route.verb(),
            template: route.uri_template().to_owned(),
            params: route.param_names().map(str::to_owned).collect(),
            json_body: route
                .static_options()
                .json_body
                .unwrap_or(route.verb() == Verb::Put),
        })
        .collect();

    let color = output::should_color(global.color);
    let format = global.output.unwrap_or(OutputFormat::Table);
    let rendered = output::render_list(format, &routes, |route| RouteRow {
        method: route.method.clone(),
        verb: output::verb_label(route.kind, color),
        template: format!("{}{}", def.root_uri(), route.template),
        body: if route.json_body { "json" } else { "form" },
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
