//! `trellis call`: invoke a generated request method.

use std::sync::Arc;

use serde_json::Map;
use tracing::{debug, info};
use trellis_api::{HttpTransport, RequestOptions, RouteCall};
use trellis_core::{CoreError, Model};

use crate::cli::{CallArgs, GlobalOpts, OutputFormat};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

fn build_call(args: &CallArgs, global: &GlobalOpts) -> RouteCall {
    let params: Map<_, _> = args
        .params
        .iter()
        .map(|(key, value)| (key.clone(), util::parse_value(value)))
        .collect();

    let mut options = RequestOptions::default();
    if args.json_body {
        options = options.json_body(true);
    }
    options.timeout_ms = global.timeout.filter(|ms| *ms > 0);

    RouteCall::with_args(args.args.iter().map(String::as_str).map(util::parse_value))
        .params(params)
        .options(options)
}

#[allow(clippy::future_not_send)]
pub async fn handle(args: &CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let def = util::resolve_model(&cfg, &args.model)?;
    if !def.routes().contains(&args.method) {
        return Err(CliError::UnknownMethod {
            model: args.model.clone(),
            method: args.method.clone(),
        });
    }

    let origin = cfg.origin()?;
    let transport =
        HttpTransport::new(origin.clone(), &cfg.transport_config()).map_err(CoreError::from)?;
    let model = Model::with_transport(def, Arc::new(transport));

    info!(model = %args.model, method = %args.method, %origin, "calling");
    let call = build_call(args, global);
    debug!(args = call.args.len(), params = call.params.len(), "call prepared");
    let payload = model.call(&args.method, call).await?;

    let format = util::output_format(global, &cfg, OutputFormat::Json);
    let rendered = output::render_value(format, &payload)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
