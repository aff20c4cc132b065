//! Submit command - launch an operation.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::Style;
use luna_aml::SubmitOperationRequest;

use super::{Context, OwnerArgs, print_json};

/// Arguments for the submit command.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Pipeline entry point; also the operation name used for lookups
    pub entry_point: String,

    /// Product the operation belongs to
    #[arg(long)]
    pub product: String,

    /// Deployment of the product
    #[arg(long)]
    pub deployment: String,

    /// API version of the deployment
    #[arg(long = "api-version")]
    pub api_version: String,

    /// Opaque input passed to the pipeline
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read the pipeline input from a file
    #[arg(long = "input-file")]
    pub input_file: Option<PathBuf>,

    /// Operation this one follows (recorded by callers, not sent to the pipeline)
    #[arg(long)]
    pub predecessor: Option<String>,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Run the submit command.
pub async fn run(args: SubmitArgs, ctx: &Context) -> Result<()> {
    let user_input = match (&args.input, &args.input_file) {
        (Some(input), _) => input.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => bail!("one of --input or --input-file is required"),
    };

    let adapter = ctx.connect().await?;
    let request = SubmitOperationRequest {
        product_name: args.product,
        deployment_name: args.deployment,
        api_version: args.api_version,
        entry_point: args.entry_point.clone(),
        user_input,
        predecessor_operation_id: args.predecessor,
        user_id: args.owner.user_id,
        subscription_id: args.owner.subscription_id,
    };

    let operation_id = adapter.submit_operation(request).await?;

    if ctx.json_output {
        print_json(&serde_json::json!({
            "operationId": operation_id,
            "operationName": args.entry_point,
        }))?;
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!(
            "{} Submitted {} {}",
            green.apply_to("✓"),
            args.entry_point,
            dim.apply_to(operation_id.as_str())
        );
    }

    Ok(())
}
